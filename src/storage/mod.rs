//! SQLite cache of extraction results
//!
//! A commit is immutable, so a `RepositoryData` stays valid for as long as
//! its `(repository_id, root_commit_hash, fingerprint)` key exists. The
//! fingerprint names the extraction settings (hash algorithm, languages,
//! ignore patterns, size limit) that produced the entry. The reference a
//! commit was last requested under is kept for traceability only.

mod schema;

pub use schema::{SCHEMA, SCHEMA_VERSION};

use crate::contract::{Digest, File, RepositoryData};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

/// Cache connection wrapper
pub struct ExtractionCache {
    conn: Connection,
}

impl ExtractionCache {
    /// Open or create a cache database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open cache database at {:?}", path))?;
        conn.busy_timeout(Duration::from_secs(5))
            .context("Failed to set busy timeout")?;

        let cache = Self { conn };
        cache.initialize()?;

        Ok(cache)
    }

    /// Open an in-memory cache (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;

        let cache = Self { conn };
        cache.initialize()?;

        Ok(cache)
    }

    fn initialize(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .context("Failed to read cache schema version")?;

        if version != SCHEMA_VERSION {
            if version != 0 {
                tracing::info!(
                    "Rebuilding extraction cache (schema {} -> {})",
                    version,
                    SCHEMA_VERSION
                );
            }
            self.conn
                .execute_batch(schema::RESET)
                .context("Failed to reset cache schema")?;
        }

        self.conn
            .execute_batch(SCHEMA)
            .context("Failed to initialize cache schema")?;
        self.conn
            .pragma_update(None, "user_version", SCHEMA_VERSION)
            .context("Failed to record cache schema version")?;
        Ok(())
    }

    /// Look up a previous extraction made under `fingerprint`
    pub fn get(
        &self,
        repository_id: &str,
        commit: &Digest,
        fingerprint: &str,
    ) -> Result<Option<RepositoryData>> {
        let url: Option<String> = self
            .conn
            .query_row(
                r#"
                SELECT url FROM extractions
                WHERE repository_id = ?1 AND root_commit_hash = ?2 AND fingerprint = ?3
                "#,
                params![repository_id, commit.as_bytes(), fingerprint],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to look up extraction")?;

        let Some(url) = url else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            r#"
            SELECT language, path, uast, hash
            FROM files
            WHERE repository_id = ?1 AND root_commit_hash = ?2 AND fingerprint = ?3
            ORDER BY position
            "#,
        )?;

        let rows = stmt.query_map(params![repository_id, commit.as_bytes(), fingerprint], |row| {
            Ok(File {
                language: row.get(0)?,
                path: row.get(1)?,
                uast: row.get(2)?,
                hash: Digest::new(row.get::<_, Vec<u8>>(3)?),
            })
        })?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row.context("Failed to read cached file")?);
        }

        Ok(Some(RepositoryData {
            repository_id: repository_id.to_string(),
            url,
            files,
        }))
    }

    /// Store an extraction, replacing any previous one for the same commit
    /// and fingerprint
    pub fn put(
        &self,
        commit: &Digest,
        fingerprint: &str,
        reference: &str,
        data: &RepositoryData,
    ) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        tx.execute(
            "DELETE FROM files WHERE repository_id = ?1 AND root_commit_hash = ?2 AND fingerprint = ?3",
            params![data.repository_id, commit.as_bytes(), fingerprint],
        )?;

        tx.execute(
            r#"
            INSERT OR REPLACE INTO extractions (
                repository_id, root_commit_hash, fingerprint, url, reference, extracted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                data.repository_id,
                commit.as_bytes(),
                fingerprint,
                data.url,
                reference,
                chrono::Utc::now().to_rfc3339(),
            ],
        )
        .context("Failed to store extraction")?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO files (
                    repository_id, root_commit_hash, fingerprint,
                    position, path, language, uast, hash
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;

            for (position, file) in data.files.iter().enumerate() {
                stmt.execute(params![
                    data.repository_id,
                    commit.as_bytes(),
                    fingerprint,
                    position as i64,
                    file.path,
                    file.language,
                    file.uast,
                    file.hash.as_bytes(),
                ])
                .with_context(|| format!("Failed to store file {}", file.path))?;
            }
        }

        tx.commit().context("Failed to commit extraction")?;
        Ok(())
    }

    /// Reference a commit was last extracted under, across all settings
    pub fn last_reference(&self, repository_id: &str, commit: &Digest) -> Result<Option<String>> {
        self.conn
            .query_row(
                r#"
                SELECT reference FROM extractions
                WHERE repository_id = ?1 AND root_commit_hash = ?2
                ORDER BY extracted_at DESC, rowid DESC
                LIMIT 1
                "#,
                params![repository_id, commit.as_bytes()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read reference")
    }

    /// Remove every cached extraction
    pub fn clear(&self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM files; DELETE FROM extractions;")
            .context("Failed to clear cache")?;
        Ok(())
    }

    /// Get cache statistics
    pub fn stats(&self) -> Result<CacheStats> {
        let extractions: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM extractions", [], |row| row.get(0))?;

        let repositories: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT repository_id) FROM extractions",
            [],
            |row| row.get(0),
        )?;

        let files: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;

        Ok(CacheStats {
            repositories: repositories as usize,
            extractions: extractions as usize,
            files: files as usize,
        })
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub repositories: usize,
    pub extractions: usize,
    pub files: usize,
}
