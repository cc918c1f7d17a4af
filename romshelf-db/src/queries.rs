//! Read queries for the pipeline database.
//!
//! Provides entity lookups, hash matching against a catalog, recheck
//! targeting, and the duplicate listings the selection engine works from.

use std::path::PathBuf;
use std::str::FromStr;

use romshelf_core::{
    Artifact, ArtifactState, CatalogEntry, CatalogFile, Game, Library, Platform, Release,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::operations::OperationError;

/// Parse a text column through `FromStr`, reporting failures as a
/// conversion error on that column.
pub(crate) fn parse_column<T>(idx: usize, value: String) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Decode a JSON text column.
pub(crate) fn json_column<T>(idx: usize, value: &str) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ── Platform Lookups ────────────────────────────────────────────────────────

const PLATFORM_COLUMNS: &str = "id, name, extensions, dat_source_url, active_dat_file_id";

/// Get a platform by ID.
pub fn get_platform(conn: &Connection, id: &str) -> Result<Option<Platform>, OperationError> {
    let sql = format!("SELECT {PLATFORM_COLUMNS} FROM platforms WHERE id = ?1");
    conn.query_row(&sql, params![id], row_to_platform)
        .optional()
        .map_err(Into::into)
}

/// List all platforms, ordered by ID.
pub fn list_platforms(conn: &Connection) -> Result<Vec<Platform>, OperationError> {
    let sql = format!("SELECT {PLATFORM_COLUMNS} FROM platforms ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_platform)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

fn row_to_platform(row: &Row) -> rusqlite::Result<Platform> {
    let extensions: String = row.get(2)?;
    Ok(Platform {
        id: row.get(0)?,
        name: row.get(1)?,
        extensions: json_column(2, &extensions)?,
        dat_source_url: row.get(3)?,
        active_dat_file_id: row.get(4)?,
    })
}

// ── Library Lookups ─────────────────────────────────────────────────────────

const LIBRARY_COLUMNS: &str = "id, root, platform_id, auto_organize, last_scanned_at";

pub fn get_library(conn: &Connection, id: i64) -> Result<Option<Library>, OperationError> {
    let sql = format!("SELECT {LIBRARY_COLUMNS} FROM libraries WHERE id = ?1");
    conn.query_row(&sql, params![id], row_to_library)
        .optional()
        .map_err(Into::into)
}

pub fn list_libraries(conn: &Connection) -> Result<Vec<Library>, OperationError> {
    let sql = format!("SELECT {LIBRARY_COLUMNS} FROM libraries ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_library)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

fn row_to_library(row: &Row) -> rusqlite::Result<Library> {
    let root: String = row.get(1)?;
    Ok(Library {
        id: row.get(0)?,
        root: PathBuf::from(root),
        platform_id: row.get(2)?,
        auto_organize: row.get(3)?,
        last_scanned_at: row.get(4)?,
    })
}

// ── Catalog File Lookups ────────────────────────────────────────────────────

const DAT_FILE_COLUMNS: &str = "id, platform_id, filename, storage_path, size_bytes, sha256,
     version, source, uploaded_at, activated_at";

pub fn get_dat_file(conn: &Connection, id: i64) -> Result<Option<CatalogFile>, OperationError> {
    let sql = format!("SELECT {DAT_FILE_COLUMNS} FROM dat_files WHERE id = ?1");
    conn.query_row(&sql, params![id], row_to_dat_file)
        .optional()
        .map_err(Into::into)
}

/// Catalog files of a platform, newest first.
pub fn list_dat_files(
    conn: &Connection,
    platform_id: &str,
) -> Result<Vec<CatalogFile>, OperationError> {
    let sql = format!(
        "SELECT {DAT_FILE_COLUMNS} FROM dat_files WHERE platform_id = ?1
         ORDER BY uploaded_at DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![platform_id], row_to_dat_file)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// The catalog file of a platform with this content hash, if already stored.
pub fn find_dat_file_by_sha256(
    conn: &Connection,
    platform_id: &str,
    sha256: &str,
) -> Result<Option<CatalogFile>, OperationError> {
    let sql = format!(
        "SELECT {DAT_FILE_COLUMNS} FROM dat_files WHERE platform_id = ?1 AND sha256 = ?2"
    );
    conn.query_row(&sql, params![platform_id, sha256], row_to_dat_file)
        .optional()
        .map_err(Into::into)
}

fn row_to_dat_file(row: &Row) -> rusqlite::Result<CatalogFile> {
    let storage_path: String = row.get(3)?;
    let size: i64 = row.get(4)?;
    Ok(CatalogFile {
        id: row.get(0)?,
        platform_id: row.get(1)?,
        filename: row.get(2)?,
        storage_path: PathBuf::from(storage_path),
        size_bytes: size as u64,
        sha256: row.get(5)?,
        version: row.get(6)?,
        source: row.get(7)?,
        uploaded_at: row.get(8)?,
        activated_at: row.get(9)?,
    })
}

// ── Catalog Entry Lookups ───────────────────────────────────────────────────

const ENTRY_COLUMNS: &str = "id, dat_file_id, platform_id, canonical_name, crc32, md5, sha1,
     region, languages, serial, revision, verified, source";

/// Entries of one catalog file, ordered by canonical name.
pub fn list_dat_entries(
    conn: &Connection,
    dat_file_id: i64,
) -> Result<Vec<CatalogEntry>, OperationError> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM dat_entries WHERE dat_file_id = ?1 ORDER BY canonical_name"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![dat_file_id], row_to_entry)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

pub fn count_dat_entries(conn: &Connection, dat_file_id: i64) -> Result<usize, OperationError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM dat_entries WHERE dat_file_id = ?1",
        params![dat_file_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Find the entry of a catalog file whose CRC32 or SHA1 equals the given
/// fingerprint. A SHA1 hit wins over a CRC32-only hit; among equals the
/// lowest entry ID is returned.
pub fn find_entry_by_hash(
    conn: &Connection,
    dat_file_id: i64,
    crc32: Option<&str>,
    sha1: Option<&str>,
) -> Result<Option<CatalogEntry>, OperationError> {
    if crc32.is_none() && sha1.is_none() {
        return Ok(None);
    }
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM dat_entries
         WHERE dat_file_id = ?1 AND (sha1 = ?3 OR crc32 = ?2)
         ORDER BY (sha1 IS NOT NULL AND sha1 = ?3) DESC, id
         LIMIT 1"
    );
    conn.query_row(&sql, params![dat_file_id, crc32, sha1], row_to_entry)
        .optional()
        .map_err(Into::into)
}

fn row_to_entry(row: &Row) -> rusqlite::Result<CatalogEntry> {
    let languages: String = row.get(8)?;
    Ok(CatalogEntry {
        id: row.get(0)?,
        dat_file_id: row.get(1)?,
        platform_id: row.get(2)?,
        canonical_name: row.get(3)?,
        crc32: row.get(4)?,
        md5: row.get(5)?,
        sha1: row.get(6)?,
        region: row.get(7)?,
        languages: json_column(8, &languages)?,
        serial: row.get(9)?,
        revision: row.get(10)?,
        verified: row.get(11)?,
        source: row.get(12)?,
    })
}

// ── Artifact Lookups ────────────────────────────────────────────────────────

const ARTIFACT_COLUMNS: &str = "a.id, a.library_id, a.path, a.size_bytes, a.crc32, a.sha1,
     a.format, a.group_id, a.release_id, a.preferred, a.state, a.verified, a.revision";

pub fn get_artifact(conn: &Connection, id: i64) -> Result<Option<Artifact>, OperationError> {
    let sql = format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts a WHERE a.id = ?1");
    conn.query_row(&sql, params![id], row_to_artifact)
        .optional()
        .map_err(Into::into)
}

/// The artifact at a relative path in a library.
pub fn find_artifact(
    conn: &Connection,
    library_id: i64,
    path: &str,
) -> Result<Option<Artifact>, OperationError> {
    let sql = format!(
        "SELECT {ARTIFACT_COLUMNS} FROM artifacts a WHERE a.library_id = ?1 AND a.path = ?2"
    );
    conn.query_row(&sql, params![library_id, path], row_to_artifact)
        .optional()
        .map_err(Into::into)
}

/// Every artifact of a library, ordered by path.
pub fn artifacts_in_library(
    conn: &Connection,
    library_id: i64,
) -> Result<Vec<Artifact>, OperationError> {
    let sql = format!(
        "SELECT {ARTIFACT_COLUMNS} FROM artifacts a WHERE a.library_id = ?1 ORDER BY a.path"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![library_id], row_to_artifact)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// Hashed CUE/GDI sidecars sitting directly in `dir` (library-relative,
/// `/`-separated, empty for the root), ordered by path.
pub fn sidecars_in_directory(
    conn: &Connection,
    library_id: i64,
    dir: &str,
) -> Result<Vec<Artifact>, OperationError> {
    let prefix = if dir.is_empty() {
        String::new()
    } else {
        format!("{}/", dir.trim_end_matches('/'))
    };
    let sql = format!(
        "SELECT {ARTIFACT_COLUMNS} FROM artifacts a
         WHERE a.library_id = ?1 AND a.format IN ('cue', 'gdi')
           AND substr(a.path, 1, length(?2)) = ?2
           AND instr(substr(a.path, length(?2) + 1), '/') = 0
         ORDER BY a.path"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![library_id, prefix], row_to_artifact)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// Artifacts of a platform's libraries that a catalog change could
/// resolve: hashed, and either unlinked or linked to a fallback identity.
/// Catalog-matched artifacts are never returned.
pub fn artifacts_for_recheck(
    conn: &Connection,
    platform_id: &str,
) -> Result<Vec<Artifact>, OperationError> {
    let sql = format!(
        "SELECT {ARTIFACT_COLUMNS} FROM artifacts a
         JOIN libraries l ON l.id = a.library_id
         WHERE l.platform_id = ?1
           AND (a.release_id IS NULL OR a.state = 'fallback')
           AND a.state != 'matched'
           AND (a.crc32 IS NOT NULL OR a.sha1 IS NOT NULL)
         ORDER BY a.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![platform_id], row_to_artifact)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

fn row_to_artifact(row: &Row) -> rusqlite::Result<Artifact> {
    let size: i64 = row.get(3)?;
    let state: String = row.get(10)?;
    Ok(Artifact {
        id: row.get(0)?,
        library_id: row.get(1)?,
        path: row.get(2)?,
        size_bytes: size as u64,
        crc32: row.get(4)?,
        sha1: row.get(5)?,
        format: row.get(6)?,
        group_id: row.get(7)?,
        release_id: row.get(8)?,
        preferred: row.get(9)?,
        state: parse_column(10, state)?,
        verified: row.get(11)?,
        revision: row.get(12)?,
    })
}

/// Number of artifacts in one pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateCount {
    pub state: ArtifactState,
    pub count: usize,
}

/// Artifact counts per state, in pipeline order. States with no artifacts
/// are reported as zero.
pub fn artifact_state_counts(conn: &Connection) -> Result<Vec<StateCount>, OperationError> {
    let mut stmt = conn.prepare("SELECT state, COUNT(*) FROM artifacts GROUP BY state")?;
    let rows = stmt.query_map([], |row| {
        let state: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        Ok((parse_column::<ArtifactState>(0, state)?, count as usize))
    })?;
    let found = rows.collect::<Result<Vec<_>, _>>()?;

    Ok(ArtifactState::ALL
        .iter()
        .map(|&state| StateCount {
            state,
            count: found
                .iter()
                .find(|(s, _)| *s == state)
                .map(|(_, c)| *c)
                .unwrap_or(0),
        })
        .collect())
}

// ── Game / Release Lookups ──────────────────────────────────────────────────

pub fn get_game(conn: &Connection, id: i64) -> Result<Option<Game>, OperationError> {
    conn.query_row(
        "SELECT id, title, provider, provider_id FROM games WHERE id = ?1",
        params![id],
        row_to_game,
    )
    .optional()
    .map_err(Into::into)
}

fn row_to_game(row: &Row) -> rusqlite::Result<Game> {
    Ok(Game {
        id: row.get(0)?,
        title: row.get(1)?,
        provider: row.get(2)?,
        provider_id: row.get(3)?,
    })
}

pub fn get_release(conn: &Connection, id: i64) -> Result<Option<Release>, OperationError> {
    conn.query_row(
        "SELECT id, game_id, region, language FROM releases WHERE id = ?1",
        params![id],
        |row| {
            Ok(Release {
                id: row.get(0)?,
                game_id: row.get(1)?,
                region: row.get(2)?,
                language: row.get(3)?,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

// ── Duplicates ──────────────────────────────────────────────────────────────

/// A game with more than one linked artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGame {
    pub game_id: i64,
    pub title: String,
    pub provider: String,
    pub copies: usize,
    pub preferred_artifact_id: Option<i64>,
}

/// Games with more than one linked artifact, optionally limited to the
/// libraries of one platform. Ordered by title.
pub fn duplicate_games(
    conn: &Connection,
    platform_id: Option<&str>,
) -> Result<Vec<DuplicateGame>, OperationError> {
    let mut stmt = conn.prepare(
        "SELECT g.id, g.title, g.provider, COUNT(a.id),
                MAX(CASE WHEN a.preferred THEN a.id END)
         FROM games g
         JOIN releases r ON r.game_id = g.id
         JOIN artifacts a ON a.release_id = r.id
         JOIN libraries l ON l.id = a.library_id
         WHERE ?1 IS NULL OR l.platform_id = ?1
         GROUP BY g.id
         HAVING COUNT(a.id) > 1
         ORDER BY g.title, g.id",
    )?;
    let rows = stmt.query_map(params![platform_id], |row| {
        let copies: i64 = row.get(3)?;
        Ok(DuplicateGame {
            game_id: row.get(0)?,
            title: row.get(1)?,
            provider: row.get(2)?,
            copies: copies as usize,
            preferred_artifact_id: row.get(4)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// One linked copy of a game, with the fields the selection engine scores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRow {
    pub artifact_id: i64,
    pub path: String,
    pub region: Option<String>,
    pub verified: bool,
    pub revision: Option<String>,
    pub preferred: bool,
}

/// Every artifact linked to any release of a game, in artifact ID order.
pub fn selection_candidates(
    conn: &Connection,
    game_id: i64,
) -> Result<Vec<CandidateRow>, OperationError> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.path, r.region, a.verified, a.revision, a.preferred
         FROM artifacts a
         JOIN releases r ON r.id = a.release_id
         WHERE r.game_id = ?1
         ORDER BY a.id",
    )?;
    let rows = stmt.query_map(params![game_id], |row| {
        Ok(CandidateRow {
            artifact_id: row.get(0)?,
            path: row.get(1)?,
            region: row.get(2)?,
            verified: row.get(3)?,
            revision: row.get(4)?,
            preferred: row.get(5)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}
