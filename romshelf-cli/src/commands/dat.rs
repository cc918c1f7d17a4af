use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;
use rusqlite::Connection;

use romshelf_core::{Job, Platform};
use romshelf_dat::SystemExtractor;
use romshelf_db::{
    count_dat_entries, enqueue, enqueue_unique, enqueue_unique_queued, get_platform,
    list_dat_files,
};
use romshelf_import::{
    ImportProgress, SOURCE_UPLOAD, activate_catalog, deactivate_catalog, import_dat_file,
    register_dat_file,
};
use romshelf_lib::Settings;

use super::format_bytes;
use crate::error::CliError;

/// Progress bar for an inline catalog import.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "  {spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} entries {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        bar.set_style(style);
        Self { bar }
    }
}

impl ImportProgress for BarProgress {
    fn on_entries(&self, current: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(current as u64);
    }

    fn on_phase(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn on_complete(&self, _message: &str) {
        self.bar.finish_and_clear();
    }
}

fn require_platform(conn: &Connection, platform: &str) -> Result<Platform, CliError> {
    get_platform(conn, platform)?
        .ok_or_else(|| CliError::not_found(format!("platform '{platform}'")))
}

/// Copy a local DAT into managed storage and queue its import.
pub(crate) fn run_dat_add(
    conn: &Connection,
    settings: &Settings,
    platform: &str,
    file: &Path,
) -> Result<(), CliError> {
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CliError::invalid(format!("{} is not a file", file.display())))?;

    let reg = register_dat_file(
        conn,
        &settings.dat_storage_dir(platform),
        platform,
        file,
        &filename,
        SOURCE_UPLOAD,
    )?;

    if reg.created {
        log::info!(
            "Stored {} as DAT {} ({})",
            filename.if_supports_color(Stdout, |t| t.cyan()),
            reg.dat_file.id.if_supports_color(Stdout, |t| t.bold()),
            format_bytes(reg.dat_file.size_bytes),
        );
        if let Some(job) = reg.import_job {
            log::info!("Queued import as job {}", job);
        }
    } else {
        log::info!(
            "{} is identical to DAT {}; nothing to do",
            filename,
            reg.dat_file.id.if_supports_color(Stdout, |t| t.bold()),
        );
    }
    Ok(())
}

pub(crate) fn run_dat_fetch(conn: &Connection, platform: &str) -> Result<(), CliError> {
    let p = require_platform(conn, platform)?;
    if p.dat_source_url.is_none() {
        return Err(CliError::invalid(format!(
            "platform '{platform}' has no DAT source URL; set one with 'romshelf platform add --dat-url'"
        )));
    }
    match enqueue_unique(conn, &Job::DatFetch { platform_id: p.id })? {
        Some(job) => log::info!("Queued DAT fetch for {} as job {}", platform, job),
        None => log::info!("A DAT fetch for {} is already queued", platform),
    }
    Ok(())
}

pub(crate) fn run_dat_list(conn: &Connection, platform: &str) -> Result<(), CliError> {
    let p = require_platform(conn, platform)?;
    let files = list_dat_files(conn, &p.id)?;
    if files.is_empty() {
        log::info!("No DAT files for {}.", platform);
        return Ok(());
    }

    for f in &files {
        let active = p.active_dat_file_id == Some(f.id);
        let entries = count_dat_entries(conn, f.id)?;
        log::info!(
            "{} {:>4}  {}  v{}  {} entries  {}  {}",
            if active {
                "*".if_supports_color(Stdout, |t| t.green()).to_string()
            } else {
                " ".to_string()
            },
            f.id,
            f.filename.if_supports_color(Stdout, |t| t.cyan()),
            f.version.as_deref().unwrap_or("?"),
            entries,
            f.source,
            f.uploaded_at.if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    Ok(())
}

/// Import a stored DAT inline rather than through the queue.
pub(crate) fn run_dat_import(
    conn: &Connection,
    settings: &Settings,
    dat_id: i64,
) -> Result<(), CliError> {
    let extractor = SystemExtractor::new(settings.dat.archive_timeout());
    let progress = BarProgress::new();
    let result = import_dat_file(
        conn,
        dat_id,
        &extractor,
        settings.dat.import_batch_size,
        Some(&progress),
    );
    progress.bar.finish_and_clear();
    let stats = result?;

    log::info!(
        "{} Imported {} entries in {} batches ({}{})",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        stats.entries.if_supports_color(Stdout, |t| t.bold()),
        stats.batches,
        stats.source,
        stats
            .version
            .as_deref()
            .map(|v| format!(", version {v}"))
            .unwrap_or_default(),
    );
    Ok(())
}

pub(crate) fn run_dat_activate(
    conn: &Connection,
    platform: &str,
    dat_id: i64,
) -> Result<(), CliError> {
    let recheck = activate_catalog(conn, platform, dat_id)?;
    log::info!(
        "DAT {} is now active for {}",
        dat_id.if_supports_color(Stdout, |t| t.bold()),
        platform
    );
    match recheck {
        Some(job) => log::info!("Queued recheck as job {}", job),
        None => log::info!("A recheck is already queued"),
    }
    Ok(())
}

pub(crate) fn run_dat_deactivate(conn: &Connection, platform: &str) -> Result<(), CliError> {
    require_platform(conn, platform)?;
    match deactivate_catalog(conn, platform)? {
        Some(id) => log::info!("DAT {} is no longer active for {}", id, platform),
        None => log::info!("{} has no active DAT", platform),
    }
    Ok(())
}

pub(crate) fn run_dat_recheck(conn: &Connection, platform: &str) -> Result<(), CliError> {
    let p = require_platform(conn, platform)?;
    if p.active_dat_file_id.is_none() {
        log::warn!("{} has no active DAT; the recheck will do nothing", platform);
    }
    match enqueue_unique_queued(conn, &Job::DatRecheck { platform_id: p.id })? {
        Some(job) => log::info!("Queued recheck of {} as job {}", platform, job),
        None => log::info!("A recheck of {} is already queued", platform),
    }
    Ok(())
}

pub(crate) fn run_dat_prune(conn: &Connection, keep: Option<usize>) -> Result<(), CliError> {
    let job = enqueue(conn, &Job::DatPrune { keep_count: keep })?;
    log::info!("Queued DAT prune as job {}", job);
    Ok(())
}
