//! Database schema definition

/// Bumped whenever the layout changes; older caches are rebuilt from scratch
pub const SCHEMA_VERSION: i64 = 2;

/// Tables dropped when an older layout is found
pub const RESET: &str = r#"
DROP TABLE IF EXISTS files;
DROP TABLE IF EXISTS extractions;
"#;

/// SQL schema for the extraction cache
pub const SCHEMA: &str = r#"
-- One row per extracted (repository, commit, settings fingerprint)
CREATE TABLE IF NOT EXISTS extractions (
    repository_id TEXT NOT NULL,
    root_commit_hash BLOB NOT NULL,
    fingerprint TEXT NOT NULL,
    url TEXT NOT NULL,
    reference TEXT NOT NULL,
    extracted_at TEXT NOT NULL,
    PRIMARY KEY (repository_id, root_commit_hash, fingerprint)
);

-- Files of an extraction, in response order
CREATE TABLE IF NOT EXISTS files (
    repository_id TEXT NOT NULL,
    root_commit_hash BLOB NOT NULL,
    fingerprint TEXT NOT NULL,
    position INTEGER NOT NULL,
    path TEXT NOT NULL,
    language TEXT NOT NULL,
    uast TEXT NOT NULL,
    hash BLOB NOT NULL,
    PRIMARY KEY (repository_id, root_commit_hash, fingerprint, path)
);

CREATE INDEX IF NOT EXISTS idx_files_hash ON files(hash);
"#;
