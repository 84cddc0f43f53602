//! uast-extractor - Repository to universal syntax tree extraction
//!
//! This library defines the extraction contract (`Request` in,
//! `RepositoryData` out) and a local reference extractor built from git,
//! tree-sitter and content hashing collaborators.

pub mod cli;
pub mod config;
pub mod contract;
pub mod extract;
pub mod repo;
pub mod service;
pub mod storage;

/// Re-export commonly used types
pub use config::ExtractorConfig;
pub use contract::{ContractError, Digest, File, RepositoryData, Request, WireFormat};
pub use service::{Extract, ExtractError, LocalExtractor};
pub use storage::ExtractionCache;

/// Application-wide error type
pub use anyhow::Result;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "uast-extractor";
