//! Write operations for every pipeline entity.
//!
//! Each function touches a single entity or a small fixed-size batch so
//! concurrent workers never hold the write lock for long.

use std::path::Path;

use romshelf_core::{ArtifactState, CatalogRecord, Platform};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use crate::now;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Entity not found: {entity_type} with id '{id}'")]
    NotFound { entity_type: String, id: String },
    #[error("Invalid operation: {0}")]
    Invalid(String),
}

impl OperationError {
    pub fn not_found(entity_type: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

// ── Platform Operations ─────────────────────────────────────────────────────

/// Insert or update a platform's descriptive fields.
///
/// The active catalog pointer is left alone; use [`activate_dat_file`].
pub fn upsert_platform(conn: &Connection, platform: &Platform) -> Result<(), OperationError> {
    let extensions = serde_json::to_string(&platform.extensions)?;
    conn.execute(
        "INSERT INTO platforms (id, name, extensions, dat_source_url)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             extensions = excluded.extensions,
             dat_source_url = excluded.dat_source_url",
        params![
            platform.id,
            platform.name,
            extensions,
            platform.dat_source_url,
        ],
    )?;
    Ok(())
}

// ── Library Operations ──────────────────────────────────────────────────────

/// Register a library root. Returns the new library ID.
pub fn insert_library(
    conn: &Connection,
    root: &Path,
    platform_id: &str,
    auto_organize: bool,
) -> Result<i64, OperationError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM platforms WHERE id = ?1)",
        params![platform_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(OperationError::not_found("platform", platform_id));
    }

    conn.execute(
        "INSERT INTO libraries (root, platform_id, auto_organize) VALUES (?1, ?2, ?3)",
        params![root.to_string_lossy(), platform_id, auto_organize],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Remove a library and (by cascade) its artifacts.
pub fn delete_library(conn: &Connection, id: i64) -> Result<(), OperationError> {
    let changed = conn.execute("DELETE FROM libraries WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(OperationError::not_found("library", id));
    }
    Ok(())
}

/// Stamp the time a scan of this library finished.
pub fn mark_library_scanned(conn: &Connection, id: i64) -> Result<(), OperationError> {
    conn.execute(
        "UPDATE libraries SET last_scanned_at = ?2 WHERE id = ?1",
        params![id, now()],
    )?;
    Ok(())
}

// ── Catalog File Operations ─────────────────────────────────────────────────

/// A catalog file about to be recorded.
#[derive(Debug, Clone)]
pub struct NewDatFile<'a> {
    pub platform_id: &'a str,
    pub filename: &'a str,
    pub storage_path: &'a Path,
    pub size_bytes: u64,
    pub sha256: &'a str,
    pub source: &'a str,
}

/// Record a stored catalog file. Returns the new ID.
pub fn insert_dat_file(conn: &Connection, file: &NewDatFile<'_>) -> Result<i64, OperationError> {
    conn.execute(
        "INSERT INTO dat_files (platform_id, filename, storage_path, size_bytes, sha256, source, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            file.platform_id,
            file.filename,
            file.storage_path.to_string_lossy(),
            file.size_bytes as i64,
            file.sha256,
            file.source,
            now(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Stamp the version declared in a catalog's header.
pub fn set_dat_file_version(
    conn: &Connection,
    id: i64,
    version: &str,
) -> Result<(), OperationError> {
    let changed = conn.execute(
        "UPDATE dat_files SET version = ?2 WHERE id = ?1",
        params![id, version],
    )?;
    if changed == 0 {
        return Err(OperationError::not_found("dat file", id));
    }
    Ok(())
}

/// Make `dat_file_id` the active catalog of `platform_id`.
///
/// The platform pointer and the file's activation timestamp are written in
/// one transaction so they never disagree. A previously active file loses
/// its activation timestamp.
pub fn activate_dat_file(
    conn: &Connection,
    platform_id: &str,
    dat_file_id: i64,
) -> Result<(), OperationError> {
    let tx = conn.unchecked_transaction()?;

    let owner: Option<String> = tx
        .query_row(
            "SELECT platform_id FROM dat_files WHERE id = ?1",
            params![dat_file_id],
            |row| row.get(0),
        )
        .optional()?;
    let owner = owner.ok_or_else(|| OperationError::not_found("dat file", dat_file_id))?;
    if owner != platform_id {
        return Err(OperationError::invalid(format!(
            "dat file {dat_file_id} belongs to platform '{owner}', not '{platform_id}'"
        )));
    }

    let previous: Option<Option<i64>> = tx
        .query_row(
            "SELECT active_dat_file_id FROM platforms WHERE id = ?1",
            params![platform_id],
            |row| row.get(0),
        )
        .optional()?;
    let previous = previous.ok_or_else(|| OperationError::not_found("platform", platform_id))?;

    if let Some(prev) = previous
        && prev != dat_file_id
    {
        tx.execute(
            "UPDATE dat_files SET activated_at = NULL WHERE id = ?1",
            params![prev],
        )?;
    }
    tx.execute(
        "UPDATE platforms SET active_dat_file_id = ?2 WHERE id = ?1",
        params![platform_id, dat_file_id],
    )?;
    tx.execute(
        "UPDATE dat_files SET activated_at = ?2 WHERE id = ?1",
        params![dat_file_id, now()],
    )?;

    tx.commit()?;
    Ok(())
}

/// Clear the active catalog of a platform. Returns the file that was
/// active, or `None` if there was none (nothing is written then).
pub fn deactivate_dat_file(
    conn: &Connection,
    platform_id: &str,
) -> Result<Option<i64>, OperationError> {
    let tx = conn.unchecked_transaction()?;

    let active: Option<Option<i64>> = tx
        .query_row(
            "SELECT active_dat_file_id FROM platforms WHERE id = ?1",
            params![platform_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(active) = active else {
        return Err(OperationError::not_found("platform", platform_id));
    };
    let Some(dat_file_id) = active else {
        return Ok(None);
    };

    tx.execute(
        "UPDATE platforms SET active_dat_file_id = NULL WHERE id = ?1",
        params![platform_id],
    )?;
    tx.execute(
        "UPDATE dat_files SET activated_at = NULL WHERE id = ?1",
        params![dat_file_id],
    )?;

    tx.commit()?;
    Ok(Some(dat_file_id))
}

/// Delete a catalog file row and all of its entries. Returns the number of
/// entries removed. The active catalog of a platform cannot be deleted.
pub fn delete_dat_file(conn: &Connection, id: i64) -> Result<usize, OperationError> {
    let tx = conn.unchecked_transaction()?;

    let active: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM platforms WHERE active_dat_file_id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    if active {
        return Err(OperationError::invalid(format!(
            "dat file {id} is active and cannot be deleted"
        )));
    }

    let entries = tx.execute("DELETE FROM dat_entries WHERE dat_file_id = ?1", params![id])?;
    let changed = tx.execute("DELETE FROM dat_files WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(OperationError::not_found("dat file", id));
    }

    tx.commit()?;
    Ok(entries)
}

// ── Catalog Entry Operations ────────────────────────────────────────────────

/// Upsert one batch of catalog records in a single transaction.
///
/// Keyed by (catalog file, canonical name): a record that already exists
/// has its hash/region/language/serial/revision/verified/source fields
/// overwritten. Catalog-sourced entries are always verified.
pub fn upsert_dat_entries(
    conn: &Connection,
    dat_file_id: i64,
    platform_id: &str,
    source: &str,
    records: &[CatalogRecord],
) -> Result<usize, OperationError> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO dat_entries (dat_file_id, platform_id, canonical_name, crc32, md5, sha1,
                 region, languages, serial, revision, verified, source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1, ?11)
             ON CONFLICT(dat_file_id, canonical_name) DO UPDATE SET
                 crc32 = excluded.crc32,
                 md5 = excluded.md5,
                 sha1 = excluded.sha1,
                 region = excluded.region,
                 languages = excluded.languages,
                 serial = excluded.serial,
                 revision = excluded.revision,
                 verified = 1,
                 source = excluded.source",
        )?;
        for record in records {
            let languages = serde_json::to_string(&record.languages)?;
            stmt.execute(params![
                dat_file_id,
                platform_id,
                record.name,
                record.crc32,
                record.md5,
                record.sha1,
                record.region,
                languages,
                record.serial,
                record.revision,
                source,
            ])?;
        }
    }
    tx.commit()?;
    Ok(records.len())
}

// ── Game / Release Operations ───────────────────────────────────────────────

/// Find the game keyed by (provider, provider id), creating it with `title`
/// if absent. Returns the game ID.
pub fn find_or_create_game(
    conn: &Connection,
    provider: &str,
    provider_id: &str,
    title: &str,
) -> Result<i64, OperationError> {
    conn.execute(
        "INSERT OR IGNORE INTO games (title, provider, provider_id) VALUES (?1, ?2, ?3)",
        params![title, provider, provider_id],
    )?;
    let id = conn.query_row(
        "SELECT id FROM games WHERE provider = ?1 AND provider_id = ?2",
        params![provider, provider_id],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Find the release of `game_id` with this exact region/language pair
/// (absent values included), creating it if needed. Returns the release ID.
pub fn find_or_create_release(
    conn: &Connection,
    game_id: i64,
    region: Option<&str>,
    language: Option<&str>,
) -> Result<i64, OperationError> {
    conn.execute(
        "INSERT OR IGNORE INTO releases (game_id, region, language) VALUES (?1, ?2, ?3)",
        params![game_id, region, language],
    )?;
    let id = conn.query_row(
        "SELECT id FROM releases WHERE game_id = ?1 AND region IS ?2 AND language IS ?3",
        params![game_id, region, language],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Delete a release nothing links to any more, then its game if that was
/// the game's last release. Returns whether the release was removed.
pub fn delete_release_if_orphaned(
    conn: &Connection,
    release_id: i64,
) -> Result<bool, OperationError> {
    let game_id: Option<i64> = conn
        .query_row(
            "SELECT game_id FROM releases r
             WHERE r.id = ?1 AND NOT EXISTS (SELECT 1 FROM artifacts a WHERE a.release_id = r.id)",
            params![release_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(game_id) = game_id else {
        return Ok(false);
    };

    conn.execute("DELETE FROM releases WHERE id = ?1", params![release_id])?;
    conn.execute(
        "DELETE FROM games WHERE id = ?1 AND NOT EXISTS (SELECT 1 FROM releases WHERE game_id = ?1)",
        params![game_id],
    )?;
    Ok(true)
}

// ── Artifact Operations ─────────────────────────────────────────────────────

/// Record a newly discovered file. Re-running for an existing
/// (library, path) is a no-op. Returns the artifact ID either way.
pub fn insert_artifact(
    conn: &Connection,
    library_id: i64,
    path: &str,
    size_bytes: u64,
) -> Result<i64, OperationError> {
    conn.execute(
        "INSERT OR IGNORE INTO artifacts (library_id, path, size_bytes, state)
         VALUES (?1, ?2, ?3, 'discovered')",
        params![library_id, path, size_bytes as i64],
    )?;
    let id = conn.query_row(
        "SELECT id FROM artifacts WHERE library_id = ?1 AND path = ?2",
        params![library_id, path],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Reset an artifact whose content changed on disk back to `discovered`,
/// dropping every derived field.
pub fn reset_artifact(conn: &Connection, id: i64, size_bytes: u64) -> Result<(), OperationError> {
    let changed = conn.execute(
        "UPDATE artifacts SET size_bytes = ?2, crc32 = NULL, sha1 = NULL, format = NULL,
             release_id = NULL, preferred = 0, state = 'discovered', verified = 0,
             revision = NULL, updated_at = datetime('now')
         WHERE id = ?1",
        params![id, size_bytes as i64],
    )?;
    if changed == 0 {
        return Err(OperationError::not_found("artifact", id));
    }
    Ok(())
}

/// Store freshly computed fingerprints and move the artifact to `hashed`.
///
/// A pure overwrite, so a repeated hash job is harmless.
pub fn record_artifact_hashes(
    conn: &Connection,
    id: i64,
    size_bytes: u64,
    crc32: &str,
    sha1: &str,
    format: Option<&str>,
) -> Result<(), OperationError> {
    let changed = conn.execute(
        "UPDATE artifacts SET size_bytes = ?2, crc32 = ?3, sha1 = ?4, format = ?5,
             state = 'hashed', updated_at = datetime('now')
         WHERE id = ?1",
        params![id, size_bytes as i64, crc32, sha1, format],
    )?;
    if changed == 0 {
        return Err(OperationError::not_found("artifact", id));
    }
    Ok(())
}

/// Stamp the multi-part group of the artifact at `path` in a library.
/// Returns false when no such artifact exists.
pub fn set_artifact_group(
    conn: &Connection,
    library_id: i64,
    path: &str,
    group_id: &str,
) -> Result<bool, OperationError> {
    let changed = conn.execute(
        "UPDATE artifacts SET group_id = ?3, updated_at = datetime('now')
         WHERE library_id = ?1 AND path = ?2",
        params![library_id, path, group_id],
    )?;
    Ok(changed > 0)
}

/// Link an artifact to a release.
pub fn link_artifact(
    conn: &Connection,
    id: i64,
    release_id: i64,
    state: ArtifactState,
    verified: bool,
    revision: Option<&str>,
) -> Result<(), OperationError> {
    let changed = conn.execute(
        "UPDATE artifacts SET release_id = ?2, state = ?3, verified = ?4, revision = ?5,
             updated_at = datetime('now')
         WHERE id = ?1",
        params![id, release_id, state.as_str(), verified, revision],
    )?;
    if changed == 0 {
        return Err(OperationError::not_found("artifact", id));
    }
    Ok(())
}

/// Mark `winner_id` preferred and clear the flag on every other artifact of
/// the same game, in one transaction.
pub fn set_preferred_artifact(
    conn: &Connection,
    game_id: i64,
    winner_id: i64,
) -> Result<(), OperationError> {
    let tx = conn.unchecked_transaction()?;

    let belongs: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM artifacts a JOIN releases r ON r.id = a.release_id
                       WHERE a.id = ?1 AND r.game_id = ?2)",
        params![winner_id, game_id],
        |row| row.get(0),
    )?;
    if !belongs {
        return Err(OperationError::invalid(format!(
            "artifact {winner_id} is not a copy of game {game_id}"
        )));
    }

    tx.execute(
        "UPDATE artifacts SET preferred = (id = ?2), updated_at = datetime('now')
         WHERE release_id IN (SELECT id FROM releases WHERE game_id = ?1)",
        params![game_id, winner_id],
    )?;

    tx.commit()?;
    Ok(())
}
