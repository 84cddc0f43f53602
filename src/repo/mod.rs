//! Repository access
//!
//! This module resolves a `(repository_id, commit)` pair into the exact file
//! tree of that commit:
//! - Catalog lookup of the repository id
//! - Commit resolution from the raw object id
//! - Tree walk collecting regular files

mod snapshot;

#[cfg(test)]
pub(crate) mod fixture;

pub use snapshot::{ResolveError, Snapshot, SnapshotEntry, SnapshotSource};

use crate::config::{ExtractorConfig, RepositoryEntry};
use crate::contract::Digest;
use git2::{ErrorCode, ObjectType, Oid, Repository as GitRepo, TreeWalkMode, TreeWalkResult};
use globset::GlobSet;
use std::sync::Arc;

/// Git mode bits of a symbolic link entry
const SYMLINK_MODE: i32 = 0o120000;

/// Resolves snapshots from local git clones listed in the catalog
pub struct GitSnapshotSource {
    config: Arc<ExtractorConfig>,
    ignore: GlobSet,
}

impl GitSnapshotSource {
    /// Create a source over the configured catalog
    pub fn new(config: Arc<ExtractorConfig>) -> Self {
        let ignore = config.ignore_set();
        Self { config, ignore }
    }

    fn open(&self, entry: &RepositoryEntry) -> Result<GitRepo, ResolveError> {
        GitRepo::open(&entry.path).map_err(|e| {
            ResolveError::Unresolvable(format!(
                "failed to open repository {:?} at {:?}: {}",
                entry.id,
                entry.path,
                e.message()
            ))
        })
    }

    /// Public URL: catalog value, then the `origin` remote, then the local path
    fn url_for(entry: &RepositoryEntry, repo: &GitRepo) -> String {
        if let Some(ref url) = entry.url {
            return url.clone();
        }

        repo.find_remote("origin")
            .ok()
            .and_then(|remote| remote.url().map(|u| u.to_string()))
            .unwrap_or_else(|| format!("file://{}", entry.path.display()))
    }

    /// Collect `(path, blob id)` for every regular file in the tree
    fn walk_tree(&self, tree: &git2::Tree<'_>) -> Result<Vec<(String, Oid)>, ResolveError> {
        let mut blobs = Vec::new();

        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            let name = match entry.name() {
                Some(name) => name,
                None => {
                    tracing::warn!("Skipping entry with non UTF-8 name under {:?}", root);
                    return TreeWalkResult::Skip;
                }
            };

            match entry.kind() {
                Some(ObjectType::Tree) => {
                    let dir = format!("{}{}/", root, name);
                    if self.ignore.is_match(&dir) {
                        tracing::debug!("Ignoring directory {}", dir);
                        return TreeWalkResult::Skip;
                    }
                }
                Some(ObjectType::Blob) if entry.filemode() != SYMLINK_MODE => {
                    blobs.push((format!("{}{}", root, name), entry.id()));
                }
                // Submodules and symlinks are not part of the snapshot
                _ => {}
            }

            TreeWalkResult::Ok
        })
        .map_err(|e| ResolveError::Unresolvable(format!("tree walk failed: {}", e.message())))?;

        Ok(blobs)
    }
}

impl SnapshotSource for GitSnapshotSource {
    fn resolve(&self, repository_id: &str, commit: &Digest) -> Result<Snapshot, ResolveError> {
        let entry = self.config.repository(repository_id).ok_or_else(|| {
            ResolveError::NotFound(format!("repository {:?} is not in the catalog", repository_id))
        })?;

        let repo = self.open(entry)?;

        let oid = Oid::from_bytes(commit.as_bytes()).map_err(|_| {
            ResolveError::Unresolvable(format!(
                "{} ({} bytes) is not a git object id",
                commit,
                commit.len()
            ))
        })?;

        let object = match repo.find_object(oid, None) {
            Ok(object) => object,
            Err(e) if e.code() == ErrorCode::NotFound => {
                return Err(ResolveError::NotFound(format!(
                    "commit {} in repository {:?}",
                    oid, repository_id
                )));
            }
            Err(e) => {
                return Err(ResolveError::Unresolvable(format!(
                    "failed to read object {}: {}",
                    oid,
                    e.message()
                )));
            }
        };

        let commit_obj = object.peel_to_commit().map_err(|e| {
            ResolveError::Unresolvable(format!("{} is not a commit: {}", oid, e.message()))
        })?;

        let tree = commit_obj.tree().map_err(|e| {
            ResolveError::Unresolvable(format!("failed to get tree for {}: {}", oid, e.message()))
        })?;

        let mut entries = Vec::new();

        for (path, blob_id) in self.walk_tree(&tree)? {
            if self.ignore.is_match(&path) {
                tracing::debug!("Ignoring {}", path);
                continue;
            }

            let blob = repo.find_blob(blob_id).map_err(|e| {
                ResolveError::Unresolvable(format!("failed to read blob {}: {}", path, e.message()))
            })?;

            if blob.size() as u64 > self.config.max_file_size {
                tracing::debug!("Skipping {} ({} bytes)", path, blob.size());
                continue;
            }

            entries.push(SnapshotEntry {
                path,
                content: blob.content().to_vec(),
            });
        }

        tracing::debug!(
            "Resolved {} at {}: {} files",
            repository_id,
            oid,
            entries.len()
        );

        Ok(Snapshot {
            repository_id: repository_id.to_string(),
            commit: commit.clone(),
            url: Self::url_for(entry, &repo),
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::fixture::TestRepo;
    use super::*;

    fn source_for(repo: &TestRepo, url: Option<&str>) -> GitSnapshotSource {
        let mut config = ExtractorConfig::default();
        config.repositories.push(RepositoryEntry {
            id: "r1".to_string(),
            path: repo.path().to_path_buf(),
            url: url.map(|u| u.to_string()),
        });
        GitSnapshotSource::new(Arc::new(config))
    }

    #[test]
    fn test_resolve_commit_tree() {
        let repo = TestRepo::new();
        let commit = repo.commit(&[
            ("main.go", b"package main\n".as_slice()),
            ("src/lib.rs", b"pub fn f() {}\n".as_slice()),
            ("target/debug/out.rs", b"fn x() {}\n".as_slice()),
        ]);

        let source = source_for(&repo, Some("https://example.com/r1.git"));
        let snapshot = source.resolve("r1", &commit).unwrap();

        assert_eq!(snapshot.url, "https://example.com/r1.git");
        assert_eq!(snapshot.commit, commit);

        let paths: Vec<_> = snapshot.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["main.go", "src/lib.rs"]);
        assert_eq!(snapshot.entries[0].content, b"package main\n");
        assert_eq!(snapshot.total_bytes(), 27);
    }

    #[test]
    fn test_ignore_patterns_match_whole_components() {
        let repo = TestRepo::new();
        let commit = repo.commit(&[
            ("target_info.rs", b"fn info() {}\n".as_slice()),
            ("vendored.go", b"package main\n".as_slice()),
            ("vendor/dep/dep.go", b"package dep\n".as_slice()),
            ("web/app.min.js", b"x\n".as_slice()),
        ]);

        let source = source_for(&repo, None);
        let snapshot = source.resolve("r1", &commit).unwrap();

        let paths: Vec<_> = snapshot.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["target_info.rs", "vendored.go"]);
    }

    #[test]
    fn test_resolve_older_commit() {
        let repo = TestRepo::new();
        let first = repo.commit(&[("a.py", b"x = 1\n".as_slice())]);
        let _second = repo.commit(&[("b.py", b"y = 2\n".as_slice())]);

        let source = source_for(&repo, None);
        let snapshot = source.resolve("r1", &first).unwrap();

        let paths: Vec<_> = snapshot.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a.py"]);
        assert!(snapshot.url.starts_with("file://"));
    }

    #[test]
    fn test_unknown_repository() {
        let repo = TestRepo::new();
        let commit = repo.commit(&[("a.py", b"x = 1\n".as_slice())]);

        let source = source_for(&repo, None);
        assert!(matches!(
            source.resolve("missing", &commit),
            Err(ResolveError::NotFound(_))
        ));
    }

    #[test]
    fn test_unknown_commit() {
        let repo = TestRepo::new();
        repo.commit(&[("a.py", b"x = 1\n".as_slice())]);

        let source = source_for(&repo, None);
        let absent = Digest::new(vec![0x11; 20]);
        assert!(matches!(
            source.resolve("r1", &absent),
            Err(ResolveError::NotFound(_))
        ));
    }

    #[test]
    fn test_digest_of_wrong_length() {
        let repo = TestRepo::new();
        repo.commit(&[("a.py", b"x = 1\n".as_slice())]);

        let source = source_for(&repo, None);
        let short = Digest::new(vec![0xAB, 0xCD, 0x12, 0x34]);
        assert!(matches!(
            source.resolve("r1", &short),
            Err(ResolveError::Unresolvable(_))
        ));
    }

    #[test]
    fn test_large_files_skipped() {
        let repo = TestRepo::new();
        let big = vec![b'a'; 64];
        let commit = repo.commit(&[("big.py", big.as_slice()), ("small.py", b"x\n".as_slice())]);

        let mut config = ExtractorConfig::default();
        config.max_file_size = 16;
        config.repositories.push(RepositoryEntry {
            id: "r1".to_string(),
            path: repo.path().to_path_buf(),
            url: None,
        });
        let source = GitSnapshotSource::new(Arc::new(config));

        let snapshot = source.resolve("r1", &commit).unwrap();
        assert_eq!(snapshot.entries.len(), 1);
        assert_eq!(snapshot.entries[0].path, "small.py");
    }
}
