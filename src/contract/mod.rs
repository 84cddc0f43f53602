//! Extraction contract
//!
//! The message types exchanged by one extraction operation:
//! - [`Request`]: "analyze this repository at this commit"
//! - [`RepositoryData`]: the realized answer, one [`File`] per analyzed source file
//!
//! All three are immutable value records. They own no external resources and
//! can be cloned, cached and serialized freely. Everything that produces them
//! (VCS access, parsing, hashing, transport) lives behind the collaborator
//! traits in [`crate::repo`], [`crate::extract`] and [`crate::service`].

mod digest;
mod validate;
pub mod wire;

pub use digest::Digest;
pub use validate::{ContractError, MAX_DIGEST_LEN};
pub use wire::{WireError, WireFormat};

use serde::{Deserialize, Serialize};

/// Identifies one unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Opaque catalog key of the repository (not a URL)
    pub repository_id: String,
    /// Raw digest of the commit to analyze; sole determinant of content
    pub root_commit_hash: Digest,
    /// Advisory branch or tag name, carried for traceability only
    #[serde(default)]
    pub reference: String,
}

impl Request {
    /// Create a new request
    pub fn new(
        repository_id: impl Into<String>,
        root_commit_hash: impl Into<Digest>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            repository_id: repository_id.into(),
            root_commit_hash: root_commit_hash.into(),
            reference: reference.into(),
        }
    }
}

/// The result of one extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryData {
    /// Echo of [`Request::repository_id`]
    pub repository_id: String,
    /// Network location of the repository (may change over time)
    pub url: String,
    /// Analyzed files; order carries no meaning but is stable per input
    #[serde(default)]
    pub files: Vec<File>,
}

impl RepositoryData {
    /// Create an empty result for a repository
    pub fn new(repository_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            repository_id: repository_id.into(),
            url: url.into(),
            files: Vec::new(),
        }
    }

    /// Look up a file by its repository-relative path
    pub fn file(&self, path: &str) -> Option<&File> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Iterate over `(path, hash)` pairs
    pub fn path_hashes(&self) -> impl Iterator<Item = (&str, &Digest)> {
        self.files.iter().map(|f| (f.path.as_str(), &f.hash))
    }
}

/// One analyzed source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    /// Language tag from the detection collaborator's vocabulary
    pub language: String,
    /// Path relative to the repository root
    pub path: String,
    /// Serialized universal syntax tree
    pub uast: String,
    /// Raw digest of the file bytes at the analyzed commit
    pub hash: Digest,
}

impl File {
    /// Create a new file record
    pub fn new(
        language: impl Into<String>,
        path: impl Into<String>,
        uast: impl Into<String>,
        hash: impl Into<Digest>,
    ) -> Self {
        Self {
            language: language.into(),
            path: path.into(),
            uast: uast.into(),
            hash: hash.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_data_lookup() {
        let mut data = RepositoryData::new("r1", "https://example.com/r1.git");
        data.files.push(File::new("go", "main.go", "<tree>", vec![0x9f, 0x8e]));

        assert_eq!(data.file("main.go").map(|f| f.language.as_str()), Some("go"));
        assert!(data.file("lib.go").is_none());

        let pairs: Vec<_> = data.path_hashes().collect();
        assert_eq!(pairs, vec![("main.go", &Digest::new(vec![0x9f, 0x8e]))]);
    }
}
