//! Content digests

use crate::config::HashAlgorithm;
use crate::contract::Digest;
use anyhow::{Context, Result};
use git2::{ObjectType, Oid};
use sha2::{Digest as _, Sha256};

/// Hashing collaborator
pub trait ContentHasher: Send + Sync {
    /// Digest of `content`; always the same length for a given hasher
    fn digest(&self, content: &[u8]) -> Result<Digest>;

    /// Digest length in bytes
    fn digest_len(&self) -> usize;
}

/// SHA-256 of the raw bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl ContentHasher for Sha256Hasher {
    fn digest(&self, content: &[u8]) -> Result<Digest> {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Ok(Digest::new(hasher.finalize().to_vec()))
    }

    fn digest_len(&self) -> usize {
        32
    }
}

/// Git blob object id, identical to `git hash-object`
#[derive(Debug, Clone, Copy, Default)]
pub struct GitBlobHasher;

impl ContentHasher for GitBlobHasher {
    fn digest(&self, content: &[u8]) -> Result<Digest> {
        let oid = Oid::hash_object(ObjectType::Blob, content).context("Failed to hash blob")?;
        Ok(Digest::new(oid.as_bytes().to_vec()))
    }

    fn digest_len(&self) -> usize {
        20
    }
}

/// Build the hasher selected in configuration
pub fn hasher_for(algorithm: HashAlgorithm) -> Box<dyn ContentHasher> {
    match algorithm {
        HashAlgorithm::Sha256 => Box::new(Sha256Hasher),
        HashAlgorithm::GitBlob => Box::new(GitBlobHasher),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_value() {
        let digest = Sha256Hasher.digest(b"hello").unwrap();
        assert_eq!(
            digest.to_hex(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(digest.len(), Sha256Hasher.digest_len());
    }

    #[test]
    fn test_git_blob_matches_git() {
        // `echo 'hello' | git hash-object --stdin`
        let digest = GitBlobHasher.digest(b"hello\n").unwrap();
        assert_eq!(digest.to_hex(), "ce013625030ba8dba906f756967f9e9ca394464a");
        assert_eq!(digest.len(), GitBlobHasher.digest_len());
    }

    #[test]
    fn test_empty_content_still_hashes() {
        assert!(!Sha256Hasher.digest(b"").unwrap().is_empty());
        assert!(!GitBlobHasher.digest(b"").unwrap().is_empty());
    }

    #[test]
    fn test_hasher_for() {
        assert_eq!(hasher_for(HashAlgorithm::Sha256).digest_len(), 32);
        assert_eq!(hasher_for(HashAlgorithm::GitBlob).digest_len(), 20);
    }
}
