//! Command implementations

use super::{CacheAction, MessageKind};
use crate::config::ExtractorConfig;
use crate::contract::{wire, Digest, RepositoryData, Request, WireFormat};
use crate::service::{self, serve, Extract, LocalExtractor};
use crate::storage::ExtractionCache;
use anyhow::{Context, Result};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

/// Load the configuration file or defaults
pub fn load_config(path: &Path) -> Result<Arc<ExtractorConfig>> {
    Ok(Arc::new(ExtractorConfig::load_or_default(path)?))
}

fn build_extractor(
    config: Arc<ExtractorConfig>,
    no_cache: bool,
) -> Result<LocalExtractor<crate::repo::GitSnapshotSource, crate::extract::TreeSitterParser>> {
    let extractor = LocalExtractor::from_config(config)?;
    Ok(if no_cache {
        extractor.without_cache()
    } else {
        extractor
    })
}

/// Extract a repository at a commit and write the encoded response
pub fn extract(
    config: Arc<ExtractorConfig>,
    repository_id: &str,
    commit: &str,
    reference: &str,
    output: Option<&Path>,
    no_cache: bool,
    format: WireFormat,
) -> Result<RepositoryData> {
    let commit = Digest::from_hex(commit)
        .with_context(|| format!("Commit {:?} is not a hex digest", commit))?;
    let request = Request::new(repository_id, commit, reference);

    let mut extractor = build_extractor(config, no_cache)?;
    let data = extractor
        .extract(&request)
        .with_context(|| format!("Extraction of {} failed", repository_id))?;

    write_output(output, &wire::encode(&data, format)?, format)?;
    Ok(data)
}

/// Answer one encoded request
pub fn handle(
    config: Arc<ExtractorConfig>,
    input: Option<&Path>,
    output: Option<&Path>,
    no_cache: bool,
    format: WireFormat,
) -> Result<()> {
    let bytes = read_input(input)?;
    let mut extractor = build_extractor(config, no_cache)?;

    let response = service::handle(&mut extractor, &bytes, format).context("Request failed")?;
    write_output(output, &response, format)
}

/// Decode and validate a message
pub fn validate(
    kind: MessageKind,
    input: Option<&Path>,
    request: Option<&Path>,
    format: WireFormat,
) -> Result<()> {
    let bytes = read_input(input)?;

    match kind {
        MessageKind::Request => {
            let message: Request =
                wire::decode(&bytes, format).context("Failed to decode request")?;
            message.validate().context("Request failed validation")?;

            println!(
                "✓ Valid request for {} at {}",
                message.repository_id, message.root_commit_hash
            );
        }
        MessageKind::Response => {
            let data = match request {
                Some(path) => {
                    let request_bytes = std::fs::read(path)
                        .with_context(|| format!("Failed to read request {:?}", path))?;
                    let request: Request = wire::decode(&request_bytes, format)
                        .context("Failed to decode request")?;
                    service::decode_response(&request, &bytes, format)
                        .context("Response failed validation")?
                }
                None => {
                    let data: RepositoryData =
                        wire::decode(&bytes, format).context("Failed to decode response")?;
                    data.validate().context("Response failed validation")?;
                    data
                }
            };

            println!(
                "✓ Valid response for {} ({} files)",
                data.repository_id,
                data.files.len()
            );
        }
    }

    Ok(())
}

/// Serve requests on stdin/stdout until stdin closes
pub fn serve_stdio(config: Arc<ExtractorConfig>, jobs: Option<usize>) -> Result<()> {
    let config = match jobs {
        Some(jobs) => {
            let mut config = (*config).clone();
            config.max_concurrent_extractions = jobs;
            Arc::new(config)
        }
        None => config,
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    runtime.block_on(serve::serve(config, tokio::io::stdin(), tokio::io::stdout()))?;
    Ok(())
}

/// Show or clear the cache
pub fn cache_action(config: &ExtractorConfig, action: CacheAction) -> Result<()> {
    let db_path = config.cache.db_path();
    let cache = ExtractionCache::open(&db_path)?;

    match action {
        CacheAction::Stats => {
            let stats = cache.stats()?;
            println!("Extraction Cache");
            println!("================\n");
            println!("Database: {:?}", db_path);
            println!("Enabled: {}", config.cache.enabled);
            println!("Repositories: {}", stats.repositories);
            println!("Extractions: {}", stats.extractions);
            println!("Files: {}", stats.files);
        }
        CacheAction::Clear => {
            cache.clear()?;
            println!("✓ Cleared cache at {:?}", db_path);
        }
    }

    Ok(())
}

/// Print the effective configuration, or write the defaults
pub fn show_config(path: &Path, config: &ExtractorConfig, init: bool, force: bool) -> Result<()> {
    if init {
        if path.exists() && !force {
            anyhow::bail!("{:?} already exists. Use --force to overwrite.", path);
        }
        ExtractorConfig::default().save(path)?;
        println!("✓ Wrote default configuration to {:?}", path);
        return Ok(());
    }

    let content = toml::to_string_pretty(config).context("Failed to serialize configuration")?;
    println!("{}", content);
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path).with_context(|| format!("Failed to read {:?}", path)),
        None => {
            let mut bytes = Vec::new();
            std::io::stdin()
                .read_to_end(&mut bytes)
                .context("Failed to read stdin")?;
            Ok(bytes)
        }
    }
}

fn write_output(path: Option<&Path>, bytes: &[u8], format: WireFormat) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, bytes).with_context(|| format!("Failed to write {:?}", path))?;
            tracing::info!("Wrote {} bytes to {:?}", bytes.len(), path);
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            if format == WireFormat::Json {
                stdout.write_all(b"\n")?;
            }
            stdout.flush()?;
        }
    }
    Ok(())
}
