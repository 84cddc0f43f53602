//! Materialized commit snapshots

use crate::contract::Digest;

/// A regular file read from a commit tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// Path relative to repository root, `/`-separated
    pub path: String,
    /// Raw file bytes
    pub content: Vec<u8>,
}

/// The file tree of one commit
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Catalog key the snapshot was resolved from
    pub repository_id: String,
    /// Commit the files belong to
    pub commit: Digest,
    /// Network location of the repository
    pub url: String,
    /// Files in tree-walk order
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Total number of content bytes
    pub fn total_bytes(&self) -> usize {
        self.entries.iter().map(|e| e.content.len()).sum()
    }
}

/// Resolution failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The repository id or commit does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The repository or commit exists in some form but cannot be read
    #[error("unresolvable: {0}")]
    Unresolvable(String),
}

/// Repository-access collaborator
pub trait SnapshotSource {
    /// Materialize the file tree of `commit` in `repository_id`
    fn resolve(&self, repository_id: &str, commit: &Digest) -> Result<Snapshot, ResolveError>;
}
