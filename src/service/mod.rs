//! Extraction service
//!
//! [`LocalExtractor`] realizes `RepositoryData := Extract(Request)` by
//! composing the collaborators:
//! - request validation, before anything else runs
//! - cache lookup by `(repository_id, root_commit_hash)` under the
//!   fingerprint of the extraction settings
//! - snapshot resolution, per-file parsing and hashing
//! - response validation, then cache store
//!
//! [`handle`] and [`decode_response`] are the server and client sides of the
//! wire boundary.

pub mod serve;

use crate::config::ExtractorConfig;
use crate::contract::{wire, ContractError, File, RepositoryData, Request, WireError, WireFormat};
use crate::extract::{hasher_for, ContentHasher, SourceParser, TreeSitterParser};
use crate::repo::{GitSnapshotSource, ResolveError, Snapshot, SnapshotSource};
use crate::storage::ExtractionCache;
use std::sync::Arc;

/// Failure of one extraction operation
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("extractor setup failed: {0}")]
    Setup(String),

    #[error("extraction timed out after {0}s")]
    Timeout(u64),

    #[error("extraction task failed: {0}")]
    Task(String),
}

impl ExtractError {
    /// Stable machine-readable category
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::Contract(ContractError::InvalidRequest(_)) => "invalid_request",
            ExtractError::Contract(ContractError::InvalidResponse(_)) => "invalid_response",
            ExtractError::Resolve(ResolveError::NotFound(_)) => "not_found",
            ExtractError::Resolve(ResolveError::Unresolvable(_)) => "unresolvable",
            ExtractError::Wire(_) => "wire",
            ExtractError::Setup(_) => "setup",
            ExtractError::Timeout(_) => "timeout",
            ExtractError::Task(_) => "task",
        }
    }
}

/// The extraction operation
pub trait Extract {
    fn extract(&mut self, request: &Request) -> Result<RepositoryData, ExtractError>;
}

/// Extractor running the collaborators in-process
pub struct LocalExtractor<S, P> {
    source: S,
    parser: P,
    hasher: Box<dyn ContentHasher>,
    cache: Option<ExtractionCache>,
    fingerprint: String,
}

impl LocalExtractor<GitSnapshotSource, TreeSitterParser> {
    /// Build the git + tree-sitter extractor described by `config`
    pub fn from_config(config: Arc<ExtractorConfig>) -> anyhow::Result<Self> {
        let parser = TreeSitterParser::new(&config.languages)?;
        let hasher = hasher_for(config.hash_algorithm);

        let fingerprint = config.fingerprint();

        let cache = if config.cache.enabled {
            let path = config.cache.db_path();
            match ExtractionCache::open(&path) {
                Ok(cache) => Some(cache),
                Err(e) => {
                    tracing::warn!("Extracting without cache, {:?} unavailable: {:#}", path, e);
                    None
                }
            }
        } else {
            None
        };

        let extractor = Self::new(GitSnapshotSource::new(config), parser, hasher);
        Ok(match cache {
            Some(cache) => extractor.with_cache(cache, fingerprint),
            None => extractor,
        })
    }
}

impl<S: SnapshotSource, P: SourceParser> LocalExtractor<S, P> {
    /// Create an extractor without a cache
    pub fn new(source: S, parser: P, hasher: Box<dyn ContentHasher>) -> Self {
        Self {
            source,
            parser,
            hasher,
            cache: None,
            fingerprint: String::new(),
        }
    }

    /// Attach a cache; entries are shared only with extractors passing the
    /// same settings `fingerprint`
    pub fn with_cache(mut self, cache: ExtractionCache, fingerprint: impl Into<String>) -> Self {
        self.cache = Some(cache);
        self.fingerprint = fingerprint.into();
        self
    }

    /// Drop the cache, forcing fresh extractions
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn cache(&self) -> Option<&ExtractionCache> {
        self.cache.as_ref()
    }

    /// Parse and hash every file of a snapshot
    fn build(&mut self, snapshot: Snapshot) -> RepositoryData {
        tracing::debug!(
            "Building {} from {} files ({} bytes)",
            snapshot.repository_id,
            snapshot.entries.len(),
            snapshot.total_bytes()
        );

        let mut data = RepositoryData::new(snapshot.repository_id, snapshot.url);
        let mut skipped = 0usize;
        let mut failed = 0usize;

        for entry in snapshot.entries {
            match self.parser.parse(&entry.path, &entry.content) {
                Ok(Some(parsed)) => match self.hasher.digest(&entry.content) {
                    Ok(hash) => data.files.push(File {
                        language: parsed.language,
                        path: entry.path,
                        uast: parsed.uast,
                        hash,
                    }),
                    Err(e) => {
                        tracing::warn!("Failed to hash {}: {:#}", entry.path, e);
                        failed += 1;
                    }
                },
                Ok(None) => skipped += 1,
                Err(e) => {
                    // The file is omitted rather than reported half-built
                    tracing::warn!("Failed to extract {}: {:#}", entry.path, e);
                    failed += 1;
                }
            }
        }

        data.files.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::info!(
            "Extracted {}: {} files, {} unsupported, {} failed",
            data.repository_id,
            data.files.len(),
            skipped,
            failed
        );

        data
    }
}

impl<S: SnapshotSource, P: SourceParser> Extract for LocalExtractor<S, P> {
    fn extract(&mut self, request: &Request) -> Result<RepositoryData, ExtractError> {
        request.validate()?;

        tracing::debug!(
            repository_id = %request.repository_id,
            commit = %request.root_commit_hash,
            reference = %request.reference,
            "Extraction requested"
        );

        if let Some(ref cache) = self.cache {
            match cache.get(
                &request.repository_id,
                &request.root_commit_hash,
                &self.fingerprint,
            ) {
                Ok(Some(data)) => {
                    tracing::info!(
                        "Cache hit for {} at {}",
                        request.repository_id,
                        request.root_commit_hash
                    );
                    data.validate_for(request)?;
                    return Ok(data);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Cache lookup failed: {:#}", e),
            }
        }

        let snapshot = self
            .source
            .resolve(&request.repository_id, &request.root_commit_hash)?;
        let data = self.build(snapshot);
        data.validate_for(request)?;

        if let Some(ref cache) = self.cache {
            if let Err(e) = cache.put(
                &request.root_commit_hash,
                &self.fingerprint,
                &request.reference,
                &data,
            ) {
                tracing::warn!("Failed to cache extraction: {:#}", e);
            }
        }

        Ok(data)
    }
}

/// Server side: decode a request, extract, encode the response
pub fn handle<E: Extract + ?Sized>(
    extractor: &mut E,
    input: &[u8],
    format: WireFormat,
) -> Result<Vec<u8>, ExtractError> {
    let request: Request = wire::decode(input, format)?;
    let data = extractor.extract(&request)?;
    Ok(wire::encode(&data, format)?)
}

/// Client side: decode a response and check that it answers `request`
pub fn decode_response(
    request: &Request,
    bytes: &[u8],
    format: WireFormat,
) -> Result<RepositoryData, ExtractError> {
    let data: RepositoryData = wire::decode(bytes, format)?;
    data.validate_for(request)?;
    Ok(data)
}
