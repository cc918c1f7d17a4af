use std::path::Path;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;
use rusqlite::Connection;

use romshelf_core::Job;
use romshelf_db::{
    artifacts_in_library, delete_library, enqueue_unique, get_library, insert_library,
    list_libraries,
};

use crate::error::CliError;

pub(crate) fn run_library_add(
    conn: &Connection,
    root: &Path,
    platform: &str,
    auto_organize: bool,
) -> Result<(), CliError> {
    if !root.is_dir() {
        return Err(CliError::invalid(format!(
            "{} is not a directory",
            root.display()
        )));
    }
    let root = std::path::absolute(root)?;
    let id = insert_library(conn, &root, platform, auto_organize)?;

    log::info!(
        "Added library {} for {} at {}",
        id.if_supports_color(Stdout, |t| t.bold()),
        platform,
        root.display().if_supports_color(Stdout, |t| t.cyan()),
    );
    log::info!("Queue a scan with 'romshelf library scan {}'.", id);
    Ok(())
}

pub(crate) fn run_library_list(conn: &Connection) -> Result<(), CliError> {
    let libraries = list_libraries(conn)?;
    if libraries.is_empty() {
        log::info!("No libraries.");
        return Ok(());
    }

    for lib in &libraries {
        let files = artifacts_in_library(conn, lib.id)?.len();
        log::info!(
            "{:>4}  {:<8} {}{}",
            lib.id.if_supports_color(Stdout, |t| t.bold()),
            lib.platform_id,
            lib.root.display().if_supports_color(Stdout, |t| t.cyan()),
            if lib.auto_organize { " (auto-organize)" } else { "" },
        );
        log::info!(
            "      {} files, last scanned {}",
            files,
            lib.last_scanned_at.as_deref().unwrap_or("never"),
        );
    }
    Ok(())
}

pub(crate) fn run_library_remove(conn: &Connection, id: i64) -> Result<(), CliError> {
    delete_library(conn, id)?;
    log::info!("Removed library {}", id);
    Ok(())
}

/// Queue a scan; the worker does the walking.
pub(crate) fn run_library_scan(conn: &Connection, id: i64) -> Result<(), CliError> {
    if get_library(conn, id)?.is_none() {
        return Err(CliError::not_found(format!("library {id}")));
    }
    match enqueue_unique(conn, &Job::Scan { library_id: id })? {
        Some(job) => log::info!(
            "Queued scan of library {} as job {}",
            id,
            job.if_supports_color(Stdout, |t| t.bold())
        ),
        None => log::info!("A scan of library {} is already queued", id),
    }
    Ok(())
}
