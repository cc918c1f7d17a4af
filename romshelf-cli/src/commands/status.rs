use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;
use rusqlite::Connection;

use romshelf_db::{artifact_state_counts, job_counts, list_libraries, list_platforms};

use crate::error::CliError;

/// Print queue and pipeline counts.
pub(crate) fn run_status(conn: &Connection) -> Result<(), CliError> {
    let platforms = list_platforms(conn)?;
    let libraries = list_libraries(conn)?;
    let jobs = job_counts(conn)?;
    let states = artifact_state_counts(conn)?;

    log::info!("{}", "Collection".if_supports_color(Stdout, |t| t.bold()));
    log::info!("  Platforms:   {:>8}", platforms.len());
    log::info!(
        "  Active DATs: {:>8}",
        platforms
            .iter()
            .filter(|p| p.active_dat_file_id.is_some())
            .count()
    );
    log::info!("  Libraries:   {:>8}", libraries.len());
    log::info!("");

    log::info!("{}", "Artifacts".if_supports_color(Stdout, |t| t.bold()));
    for s in &states {
        log::info!("  {:<12} {:>8}", format!("{}:", s.state), s.count);
    }
    log::info!(
        "  {:<12} {:>8}",
        "total:",
        states.iter().map(|s| s.count).sum::<usize>()
    );
    log::info!("");

    log::info!("{}", "Queue".if_supports_color(Stdout, |t| t.bold()));
    log::info!("  Queued:      {:>8}", jobs.queued);
    log::info!("  Running:     {:>8}", jobs.running);
    log::info!("  Done:        {:>8}", jobs.done);
    if jobs.failed > 0 {
        log::info!(
            "  Failed:      {:>8}",
            jobs.failed.if_supports_color(Stdout, |t| t.red())
        );
    } else {
        log::info!("  Failed:      {:>8}", jobs.failed);
    }
    Ok(())
}
