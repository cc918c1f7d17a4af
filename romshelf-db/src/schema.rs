//! SQLite schema creation and migration.

use std::time::Duration;

use rusqlite::Connection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Migration error: expected version {expected}, found {found}")]
    VersionMismatch { expected: i32, found: i32 },
}

/// Current schema version. Increment when adding migrations.
pub const CURRENT_VERSION: i32 = 1;

/// How long a connection waits on another writer before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Create all tables and indexes if they don't exist.
///
/// This is idempotent: safe to call on an existing database.
pub fn create_schema(conn: &Connection) -> Result<(), SchemaError> {
    conn.execute_batch(SCHEMA_SQL)?;
    set_schema_version(conn, CURRENT_VERSION)?;
    Ok(())
}

/// Open or create the database at the given path.
///
/// Every worker opens its own connection; WAL mode plus a busy timeout lets
/// them write concurrently without failing on lock contention.
pub fn open_database(path: &std::path::Path) -> Result<Connection, SchemaError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    let version = get_schema_version(&conn)?;
    if version == 0 {
        create_schema(&conn)?;
    } else if version != CURRENT_VERSION {
        migrate(&conn, version)?;
    }

    Ok(conn)
}

/// Open an in-memory database with the full schema. Useful for testing.
pub fn open_memory() -> Result<Connection, SchemaError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Get the current schema version, or 0 if no schema exists.
fn get_schema_version(conn: &Connection) -> Result<i32, SchemaError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Record a schema version.
fn set_schema_version(conn: &Connection, version: i32) -> Result<(), SchemaError> {
    conn.execute(
        "INSERT INTO schema_version (version) SELECT ?1
         WHERE NOT EXISTS (SELECT 1 FROM schema_version WHERE version = ?1)",
        [version],
    )?;
    Ok(())
}

/// Bring an older database up to `CURRENT_VERSION`.
fn migrate(conn: &Connection, from_version: i32) -> Result<(), SchemaError> {
    if from_version > CURRENT_VERSION {
        return Err(SchemaError::VersionMismatch {
            expected: CURRENT_VERSION,
            found: from_version,
        });
    }

    // Every table is CREATE IF NOT EXISTS, so replaying the schema adds
    // whatever later versions introduced.
    log::info!(
        "Migrating database schema from version {} to {}",
        from_version,
        CURRENT_VERSION
    );
    create_schema(conn)
}

const SCHEMA_SQL: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Target systems
CREATE TABLE IF NOT EXISTS platforms (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    extensions TEXT NOT NULL DEFAULT '[]',
    dat_source_url TEXT,
    active_dat_file_id INTEGER REFERENCES dat_files(id)
);

-- Watched library roots
CREATE TABLE IF NOT EXISTS libraries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    root TEXT NOT NULL UNIQUE,
    platform_id TEXT NOT NULL REFERENCES platforms(id),
    auto_organize BOOLEAN NOT NULL DEFAULT 0,
    last_scanned_at TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Stored reference catalogs
CREATE TABLE IF NOT EXISTS dat_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    platform_id TEXT NOT NULL REFERENCES platforms(id),
    filename TEXT NOT NULL,
    storage_path TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    sha256 TEXT NOT NULL,
    version TEXT,
    source TEXT NOT NULL,
    uploaded_at TEXT NOT NULL,
    activated_at TEXT,
    UNIQUE (platform_id, sha256)
);

-- Reference fingerprints, one per (catalog file, canonical name)
CREATE TABLE IF NOT EXISTS dat_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    dat_file_id INTEGER NOT NULL REFERENCES dat_files(id),
    platform_id TEXT NOT NULL,
    canonical_name TEXT NOT NULL,
    crc32 TEXT,
    md5 TEXT,
    sha1 TEXT,
    region TEXT,
    languages TEXT NOT NULL DEFAULT '[]',
    serial TEXT,
    revision TEXT,
    verified BOOLEAN NOT NULL DEFAULT 1,
    source TEXT NOT NULL,
    UNIQUE (dat_file_id, canonical_name)
);
CREATE INDEX IF NOT EXISTS idx_dat_entries_crc32 ON dat_entries(dat_file_id, crc32);
CREATE INDEX IF NOT EXISTS idx_dat_entries_sha1 ON dat_entries(dat_file_id, sha1);

-- Canonical titles
CREATE TABLE IF NOT EXISTS games (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    provider TEXT NOT NULL,
    provider_id TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (provider, provider_id)
);

-- Regional/language editions
CREATE TABLE IF NOT EXISTS releases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    game_id INTEGER NOT NULL REFERENCES games(id) ON DELETE CASCADE,
    region TEXT,
    language TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_releases_natural
    ON releases(game_id, COALESCE(region, ''), COALESCE(language, ''));

-- Scanned files
CREATE TABLE IF NOT EXISTS artifacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    library_id INTEGER NOT NULL REFERENCES libraries(id) ON DELETE CASCADE,
    path TEXT NOT NULL,
    size_bytes INTEGER NOT NULL DEFAULT 0,
    crc32 TEXT,
    sha1 TEXT,
    format TEXT,
    group_id TEXT,
    release_id INTEGER REFERENCES releases(id) ON DELETE SET NULL,
    preferred BOOLEAN NOT NULL DEFAULT 0,
    state TEXT NOT NULL DEFAULT 'discovered',
    verified BOOLEAN NOT NULL DEFAULT 0,
    revision TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (library_id, path)
);
CREATE INDEX IF NOT EXISTS idx_artifacts_release ON artifacts(release_id);
CREATE INDEX IF NOT EXISTS idx_artifacts_state ON artifacts(state);
CREATE INDEX IF NOT EXISTS idx_artifacts_sha1 ON artifacts(sha1);

-- Durable job queue
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    payload TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'queued',
    attempts INTEGER NOT NULL DEFAULT 0,
    run_after TEXT NOT NULL,
    locked_until TEXT,
    last_error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_jobs_claim ON jobs(status, run_after);

-- Append-only audit trail
CREATE TABLE IF NOT EXISTS activity (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    kind TEXT NOT NULL,
    module TEXT NOT NULL,
    message TEXT NOT NULL,
    details TEXT NOT NULL DEFAULT 'null',
    retry TEXT
);
CREATE INDEX IF NOT EXISTS idx_activity_kind ON activity(kind, module);
"#;
