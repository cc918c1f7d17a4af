//! Hash stage: fingerprint one artifact, group multi-part disc images, and
//! match it inline.

use std::path::{Path, PathBuf};

use romshelf_core::{ActivityKind, Artifact, Library, NewActivity, normalize_extension};
use romshelf_db::{
    append_activity, get_artifact, get_library, get_platform, record_artifact_hashes,
    set_artifact_group, sidecars_in_directory,
};
use romshelf_lib::{FileHashes, SidecarKind, group_id, hash_file, sibling_path};
use rusqlite::Connection;
use serde_json::json;

use crate::error::PipelineError;
use crate::matcher::{MatchOutcome, match_artifact};

const MODULE: &str = "hash";

/// Result of hashing one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashOutcome {
    pub hashes: FileHashes,
    /// Group stamped on this artifact: its own for a sidecar, or the group
    /// of a sidecar in the same directory that names it.
    pub group_id: Option<String>,
    /// Number of artifacts stamped with the group, this one included.
    pub grouped: usize,
    pub matched: MatchOutcome,
}

/// Absolute location of an artifact on disk.
pub fn artifact_path(library: &Library, artifact: &Artifact) -> PathBuf {
    artifact
        .path
        .split('/')
        .fold(library.root.clone(), |path, part| path.join(part))
}

/// Hash an artifact's file, record the fingerprints, and match it.
///
/// Safe to repeat: every derived field is overwritten. When the file is a
/// CUE or GDI sidecar, the sidecar and every referenced track that is
/// already a known artifact of the same library get the sidecar's group id.
/// Any other file joins the group of an already hashed sidecar in its
/// directory that references it, so hashing order does not matter.
pub fn hash_artifact(conn: &Connection, artifact_id: i64) -> Result<HashOutcome, PipelineError> {
    let artifact = get_artifact(conn, artifact_id)?
        .ok_or_else(|| PipelineError::not_found("artifact", artifact_id))?;
    let library = get_library(conn, artifact.library_id)?
        .ok_or_else(|| PipelineError::not_found("library", artifact.library_id))?;
    let platform = get_platform(conn, &library.platform_id)?
        .ok_or_else(|| PipelineError::not_found("platform", &library.platform_id))?;

    let path = artifact_path(&library, &artifact);
    let hashes = hash_file(&path)?;
    let format = path
        .extension()
        .map(|e| normalize_extension(&e.to_string_lossy()))
        .filter(|e| !e.is_empty());

    record_artifact_hashes(
        conn,
        artifact.id,
        hashes.size_bytes,
        &hashes.crc32,
        &hashes.sha1,
        format.as_deref(),
    )?;
    log::debug!("Hashed {} ({} {})", artifact.path, hashes.crc32, hashes.sha1);

    let (group, grouped) = match format.as_deref().and_then(SidecarKind::from_extension) {
        Some(kind) => group_tracks(conn, &library, &artifact, kind, &path)?,
        None => join_sidecar_group(conn, &library, &artifact)?,
    };

    // Re-read so the matcher sees the fresh hashes and the current link.
    let artifact = get_artifact(conn, artifact_id)?
        .ok_or_else(|| PipelineError::not_found("artifact", artifact_id))?;
    let matched = match_artifact(conn, &artifact, &platform)?;

    append_activity(
        conn,
        &NewActivity::new(
            ActivityKind::Hash,
            MODULE,
            format!(
                "Hashed {} ({})",
                artifact.path,
                if matched.is_catalog_match() {
                    "matched"
                } else {
                    "no catalog match"
                }
            ),
        )
        .details(json!({
            "artifactId": artifact.id,
            "crc32": hashes.crc32,
            "sha1": hashes.sha1,
            "sizeBytes": hashes.size_bytes,
            "groupId": group,
            "matched": matched.is_catalog_match(),
        })),
    )?;

    Ok(HashOutcome {
        hashes,
        group_id: group,
        grouped,
        matched,
    })
}

/// Stamp a sidecar and every track it references that is already an
/// artifact with the sidecar's group.
fn group_tracks(
    conn: &Connection,
    library: &Library,
    sidecar: &Artifact,
    kind: SidecarKind,
    path: &Path,
) -> Result<(Option<String>, usize), PipelineError> {
    let content = std::fs::read(path)?;
    let content = String::from_utf8_lossy(&content);
    let gid = group_id(&sidecar.path);

    let mut grouped = 0;
    if set_artifact_group(conn, library.id, &sidecar.path, &gid)? {
        grouped += 1;
    }
    for filename in kind.referenced_files(&content) {
        let sibling = sibling_path(&sidecar.path, &filename);
        if set_artifact_group(conn, library.id, &sibling, &gid)? {
            grouped += 1;
        } else {
            log::debug!(
                "{} references {} which is not a known artifact",
                sidecar.path,
                sibling
            );
        }
    }
    Ok((Some(gid), grouped))
}

/// Give a track the group of a hashed sidecar in its directory that names
/// it. Covers tracks that showed up or were hashed after their sidecar.
fn join_sidecar_group(
    conn: &Connection,
    library: &Library,
    track: &Artifact,
) -> Result<(Option<String>, usize), PipelineError> {
    let dir = track.path.rsplit_once('/').map_or("", |(dir, _)| dir);
    for sidecar in sidecars_in_directory(conn, library.id, dir)? {
        let Some(kind) = sidecar
            .format
            .as_deref()
            .and_then(SidecarKind::from_extension)
        else {
            continue;
        };
        let content = match std::fs::read(artifact_path(library, &sidecar)) {
            Ok(content) => content,
            Err(e) => {
                log::debug!("Skipping unreadable sidecar {}: {}", sidecar.path, e);
                continue;
            }
        };
        let content = String::from_utf8_lossy(&content);
        let named = kind
            .referenced_files(&content)
            .iter()
            .any(|filename| sibling_path(&sidecar.path, filename) == track.path);
        if named {
            let gid = group_id(&sidecar.path);
            set_artifact_group(conn, library.id, &track.path, &gid)?;
            log::debug!("{} joins group {} of {}", track.path, gid, sidecar.path);
            return Ok((Some(gid), 1));
        }
    }
    Ok((None, 0))
}

#[cfg(test)]
#[path = "tests/hash_tests.rs"]
mod tests;
