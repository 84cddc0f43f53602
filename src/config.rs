//! Extractor configuration

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "uast-extractor.toml";

/// Configuration for the reference extractor and its collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Languages to analyze
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Glob patterns matched against the full repository-relative path
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Files larger than this many bytes are skipped
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Content digest used for `File::hash`
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,

    /// Upper bound on extractions running at once in `serve`
    #[serde(default = "default_max_concurrent_extractions")]
    pub max_concurrent_extractions: usize,

    /// Per-request timeout in seconds for `serve` (0 disables it)
    #[serde(default = "default_extraction_timeout_secs")]
    pub extraction_timeout_secs: u64,

    /// Extraction cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Repository catalog
    #[serde(default)]
    pub repositories: Vec<RepositoryEntry>,
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    /// Catalog key matched against `Request::repository_id`
    pub id: String,
    /// Local path of the clone (bare or with a working directory)
    pub path: PathBuf,
    /// Public URL reported in responses
    pub url: Option<String>,
}

/// Hash algorithm choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
    /// SHA-256 of the raw bytes
    #[default]
    Sha256,
    /// Git blob object id (SHA-1 of `blob <len>\0<bytes>`)
    GitBlob,
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithm::Sha256 => write!(f, "sha256"),
            HashAlgorithm::GitBlob => write!(f, "git-blob"),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether extraction results are cached
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Database path (defaults to the user cache directory)
    pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            path: None,
        }
    }
}

impl CacheConfig {
    /// Resolve the database location
    pub fn db_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("uast-extractor")
                .join("cache.db")
        })
    }
}

fn default_languages() -> Vec<String> {
    vec!["rust".to_string(), "python".to_string(), "go".to_string()]
}

fn default_ignore_patterns() -> Vec<String> {
    vec![
        "target/**".to_string(),
        "node_modules/**".to_string(),
        "vendor/**".to_string(),
        "*.min.js".to_string(),
    ]
}

fn default_max_file_size() -> u64 {
    1024 * 1024
}

fn default_max_concurrent_extractions() -> usize {
    4
}

fn default_extraction_timeout_secs() -> u64 {
    300
}

fn default_cache_enabled() -> bool {
    true
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            ignore_patterns: default_ignore_patterns(),
            max_file_size: default_max_file_size(),
            hash_algorithm: HashAlgorithm::default(),
            max_concurrent_extractions: default_max_concurrent_extractions(),
            extraction_timeout_secs: default_extraction_timeout_secs(),
            cache: CacheConfig::default(),
            repositories: Vec::new(),
        }
    }
}

impl ExtractorConfig {
    /// Load configuration from `path` or return defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Load configuration from `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: ExtractorConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Save configuration to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Find a catalog entry by repository id
    pub fn repository(&self, id: &str) -> Option<&RepositoryEntry> {
        self.repositories.iter().find(|r| r.id == id)
    }

    /// Compile `ignore_patterns`; invalid patterns are skipped with a warning
    pub fn ignore_set(&self) -> GlobSet {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignore_patterns {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => tracing::warn!("Invalid ignore pattern {:?}: {}", pattern, e),
            }
        }

        builder.build().unwrap_or_else(|e| {
            tracing::warn!("Failed to compile ignore patterns: {}", e);
            GlobSet::empty()
        })
    }

    /// Hex digest of every setting that shapes an extraction result.
    ///
    /// Cached results are only reused under the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut languages: Vec<String> =
            self.languages.iter().map(|l| l.to_lowercase()).collect();
        languages.sort();
        languages.dedup();

        let mut hasher = Sha256::new();
        hasher.update(format!("hash={}\n", self.hash_algorithm));
        hasher.update(format!("languages={}\n", languages.join(",")));
        for pattern in &self.ignore_patterns {
            hasher.update(format!("ignore={}\n", pattern));
        }
        hasher.update(format!("max_file_size={}\n", self.max_file_size));
        hex::encode(hasher.finalize())
    }
}
