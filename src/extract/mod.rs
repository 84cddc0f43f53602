//! Language detection, parsing and hashing collaborators
//!
//! This module turns the raw bytes of one file into the pieces of a
//! [`crate::contract::File`]:
//! - Language detection and UAST serialization (using tree-sitter)
//! - Content digests (SHA-256 or git blob ids)

pub mod hash;
pub mod uast;

pub use hash::{hasher_for, ContentHasher, GitBlobHasher, Sha256Hasher};
pub use uast::{Language, TreeSitterParser, UastNode};

use anyhow::Result;

/// Outcome of parsing one supported file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    /// Language tag
    pub language: String,
    /// Serialized UAST
    pub uast: String,
}

/// Language-detection and parsing collaborator
pub trait SourceParser {
    /// Parse a file.
    ///
    /// Returns `Ok(None)` when the file is outside this parser's coverage and
    /// `Err` when a supported file failed to parse.
    fn parse(&mut self, path: &str, content: &[u8]) -> Result<Option<ParsedFile>>;
}
