//! Library scanning: record every file under a library root and queue it
//! for hashing.

use std::path::Path;

use romshelf_core::{ActivityKind, Artifact, ArtifactState, Job, NewActivity};
use romshelf_db::{
    append_activity, enqueue, enqueue_unique, enqueue_unique_queued, find_artifact, get_library,
    get_platform, insert_artifact, mark_library_scanned, reset_artifact,
};
use romshelf_lib::Walker;
use rusqlite::Connection;
use serde_json::json;

use crate::error::PipelineError;

const MODULE: &str = "scan";

/// Counters from one library scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Files that passed the ignore and extension filters.
    pub seen: usize,
    pub new: usize,
    /// Known files whose size changed; reset and re-queued.
    pub changed: usize,
    /// Known files still waiting for a hash; re-queued.
    pub requeued: usize,
    pub errors: usize,
}

/// What happened to one file during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    New,
    Changed,
    Requeued,
    Unchanged,
}

/// Walk a library and record what it contains.
///
/// New files become `discovered` artifacts with a hash job. A file whose
/// size differs from the stored row is reset and re-hashed. Artifacts that
/// are still `discovered` get their hash job re-queued, which closes the
/// gap left by a crash between recording a file and queueing its hash.
///
/// A file that cannot be read is logged as an error activity and the scan
/// moves on. A library whose root is missing is skipped with a warning.
pub fn scan_library<S: AsRef<str>>(
    conn: &Connection,
    library_id: i64,
    ignore: &[S],
) -> Result<ScanStats, PipelineError> {
    let library = get_library(conn, library_id)?
        .ok_or_else(|| PipelineError::not_found("library", library_id))?;
    let platform = get_platform(conn, &library.platform_id)?
        .ok_or_else(|| PipelineError::not_found("platform", &library.platform_id))?;

    let mut stats = ScanStats::default();
    if !library.root.is_dir() {
        log::warn!(
            "Library {} root {} is not a directory, skipping",
            library.id,
            library.root.display()
        );
        append_activity(
            conn,
            &NewActivity::error(
                MODULE,
                format!("Library root {} is missing", library.root.display()),
                Job::Scan { library_id },
            )
            .details(json!({ "libraryId": library_id })),
        )?;
        return Ok(stats);
    }

    let walker = Walker::new(&library.root, ignore)?;
    log::info!("Scanning {} for {}", library.root.display(), platform.name);

    for item in walker.walk() {
        let path = match item {
            Ok(path) => path,
            Err(e) => {
                record_error(conn, library_id, None, &e.to_string(), &mut stats)?;
                continue;
            }
        };

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !platform.accepts_extension(&ext) {
            continue;
        }
        let Some(rel) = walker.relative(&path) else {
            continue;
        };
        stats.seen += 1;

        match scan_file(conn, library_id, &path, &rel) {
            Ok(FileOutcome::New) => stats.new += 1,
            Ok(FileOutcome::Changed) => stats.changed += 1,
            Ok(FileOutcome::Requeued) => stats.requeued += 1,
            Ok(FileOutcome::Unchanged) => {}
            Err(e) => record_error(conn, library_id, Some(&rel), &e.to_string(), &mut stats)?,
        }
    }

    mark_library_scanned(conn, library_id)?;
    append_activity(
        conn,
        &NewActivity::new(
            ActivityKind::Scan,
            MODULE,
            format!(
                "Scanned {}: {} new, {} changed, {} errors",
                library.root.display(),
                stats.new,
                stats.changed,
                stats.errors
            ),
        )
        .details(json!({
            "libraryId": library_id,
            "seen": stats.seen,
            "new": stats.new,
            "changed": stats.changed,
            "requeued": stats.requeued,
            "errors": stats.errors,
        })),
    )?;
    log::info!(
        "Scan of library {} done: {} seen, {} new, {} changed, {} requeued",
        library_id,
        stats.seen,
        stats.new,
        stats.changed,
        stats.requeued
    );

    Ok(stats)
}

fn scan_file(
    conn: &Connection,
    library_id: i64,
    path: &Path,
    rel: &str,
) -> Result<FileOutcome, PipelineError> {
    let size = std::fs::metadata(path)?.len();

    match find_artifact(conn, library_id, rel)? {
        None => {
            let id = insert_artifact(conn, library_id, rel, size)?;
            enqueue(conn, &Job::Hash { artifact_id: id })?;
            Ok(FileOutcome::New)
        }
        Some(Artifact { id, size_bytes, .. }) if size_bytes != size => {
            log::debug!("{} changed size ({} -> {})", rel, size_bytes, size);
            reset_artifact(conn, id, size)?;
            enqueue_unique_queued(conn, &Job::Hash { artifact_id: id })?;
            Ok(FileOutcome::Changed)
        }
        Some(artifact) if artifact.state == ArtifactState::Discovered => {
            let queued = enqueue_unique(conn, &Job::Hash {
                artifact_id: artifact.id,
            })?;
            Ok(if queued.is_some() {
                FileOutcome::Requeued
            } else {
                FileOutcome::Unchanged
            })
        }
        Some(_) => Ok(FileOutcome::Unchanged),
    }
}

fn record_error(
    conn: &Connection,
    library_id: i64,
    rel: Option<&str>,
    message: &str,
    stats: &mut ScanStats,
) -> Result<(), PipelineError> {
    stats.errors += 1;
    log::warn!("Scan error in library {}: {}", library_id, message);
    append_activity(
        conn,
        &NewActivity::error(
            MODULE,
            match rel {
                Some(rel) => format!("{rel}: {message}"),
                None => message.to_string(),
            },
            Job::Scan { library_id },
        )
        .details(json!({ "libraryId": library_id, "path": rel })),
    )?;
    Ok(())
}

#[cfg(test)]
#[path = "tests/scan_tests.rs"]
mod tests;
