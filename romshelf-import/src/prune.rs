//! Remove superseded catalog files.

use std::fs;
use std::io;

use romshelf_core::{ActivityKind, CatalogFile, Job, NewActivity};
use romshelf_db::{append_activity, delete_dat_file, list_dat_files, list_platforms};
use rusqlite::Connection;
use serde_json::json;

use crate::error::PipelineError;

const MODULE: &str = "datPrune";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub files_deleted: usize,
    pub entries_deleted: usize,
    pub errors: usize,
}

/// For every platform, keep the active catalog plus the newest `keep`
/// inactive ones, and delete the rest: stored file first, then its entries
/// and row. A missing stored file is not an error. One file failing to
/// delete is logged and the sweep continues.
pub fn prune_dat_files(conn: &Connection, keep: usize) -> Result<PruneStats, PipelineError> {
    let mut stats = PruneStats::default();

    for platform in list_platforms(conn)? {
        let files = list_dat_files(conn, &platform.id)?;
        let superseded = files
            .into_iter()
            .filter(|f| Some(f.id) != platform.active_dat_file_id)
            .skip(keep);

        for file in superseded {
            match prune_one(conn, &file) {
                Ok(entries) => {
                    stats.files_deleted += 1;
                    stats.entries_deleted += entries;
                    log::info!(
                        "Pruned dat file {} ({}) for {}",
                        file.id,
                        file.filename,
                        platform.id
                    );
                }
                Err(e) => {
                    stats.errors += 1;
                    log::error!("Failed to prune dat file {}: {}", file.id, e);
                    append_activity(
                        conn,
                        &NewActivity::error(
                            MODULE,
                            format!("Failed to prune {}: {}", file.filename, e),
                            Job::DatPrune {
                                keep_count: Some(keep),
                            },
                        )
                        .details(json!({ "datFileId": file.id, "platformId": platform.id })),
                    )?;
                }
            }
        }
    }

    append_activity(
        conn,
        &NewActivity::new(
            ActivityKind::Import,
            MODULE,
            format!(
                "Pruned {} dat file(s), {} entries",
                stats.files_deleted, stats.entries_deleted
            ),
        )
        .details(json!({
            "keep": keep,
            "filesDeleted": stats.files_deleted,
            "entriesDeleted": stats.entries_deleted,
            "errors": stats.errors,
        })),
    )?;

    Ok(stats)
}

fn prune_one(conn: &Connection, file: &CatalogFile) -> Result<usize, PipelineError> {
    match fs::remove_file(&file.storage_path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("{} already gone", file.storage_path.display());
        }
        Err(e) => return Err(e.into()),
    }
    Ok(delete_dat_file(conn, file.id)?)
}
