//! Content matching: resolve a hashed artifact to a release.
//!
//! A hit in the platform's active catalog links the artifact to a release
//! of the catalog's game. Anything else falls back to an identity keyed by
//! the artifact's own SHA1, so every hashed artifact ends up with a release
//! and identical files converge on the same fallback game.

use romshelf_core::{Artifact, ArtifactState, Platform};
use romshelf_db::{
    delete_release_if_orphaned, find_entry_by_hash, find_or_create_game, find_or_create_release,
    link_artifact,
};
use rusqlite::Connection;

use crate::error::PipelineError;

/// Provider tag of fallback identities.
pub const FALLBACK_PROVIDER: &str = "file";

/// How an artifact was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Linked through an entry of the active catalog.
    Matched { game_id: i64, release_id: i64 },
    /// Linked to the fallback identity.
    Fallback { game_id: i64, release_id: i64 },
}

impl MatchOutcome {
    pub fn is_catalog_match(&self) -> bool {
        matches!(self, MatchOutcome::Matched { .. })
    }

    pub fn release_id(&self) -> i64 {
        match self {
            MatchOutcome::Matched { release_id, .. } | MatchOutcome::Fallback { release_id, .. } => {
                *release_id
            }
        }
    }
}

/// Resolve `artifact` against the active catalog of `platform` and link it.
///
/// Relinking an artifact away from an old release removes that release
/// (and its game) once nothing else points at it.
pub fn match_artifact(
    conn: &Connection,
    artifact: &Artifact,
    platform: &Platform,
) -> Result<MatchOutcome, PipelineError> {
    if !artifact.has_hash() {
        return Err(PipelineError::validation(format!(
            "artifact {} has not been hashed",
            artifact.id
        )));
    }

    let entry = match platform.active_dat_file_id {
        Some(dat_file_id) => find_entry_by_hash(
            conn,
            dat_file_id,
            artifact.crc32.as_deref(),
            artifact.sha1.as_deref(),
        )?,
        None => None,
    };

    let outcome = match entry {
        Some(entry) => {
            let game_id =
                find_or_create_game(conn, &entry.source, &entry.canonical_name, &entry.canonical_name)?;
            let release_id = find_or_create_release(
                conn,
                game_id,
                entry.region.as_deref(),
                entry.languages.first().map(String::as_str),
            )?;
            link_artifact(
                conn,
                artifact.id,
                release_id,
                ArtifactState::Matched,
                true,
                entry.revision.as_deref(),
            )?;
            log::debug!("{} matched '{}'", artifact.path, entry.canonical_name);
            MatchOutcome::Matched { game_id, release_id }
        }
        None => {
            // Without a SHA1 the CRC32 is the best content key available.
            let key = artifact
                .sha1
                .as_deref()
                .or(artifact.crc32.as_deref())
                .unwrap_or_default();
            let game_id = find_or_create_game(conn, FALLBACK_PROVIDER, key, artifact.stem())?;
            let release_id = find_or_create_release(conn, game_id, None, None)?;
            link_artifact(
                conn,
                artifact.id,
                release_id,
                ArtifactState::Fallback,
                false,
                None,
            )?;
            log::debug!("{} has no catalog match", artifact.path);
            MatchOutcome::Fallback { game_id, release_id }
        }
    };

    if let Some(previous) = artifact.release_id
        && previous != outcome.release_id()
    {
        delete_release_if_orphaned(conn, previous)?;
    }

    Ok(outcome)
}

#[cfg(test)]
#[path = "tests/matcher_tests.rs"]
mod tests;
