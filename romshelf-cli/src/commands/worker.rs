use std::sync::Arc;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;
use tokio::sync::watch;

use romshelf_core::JobKind;
use romshelf_import::{Pipeline, WorkerOptions, run_workers};
use romshelf_lib::Settings;

use super::open_db;
use crate::error::CliError;

/// Run queue workers until Ctrl-C, or until the queue drains with `--drain`.
pub(crate) fn run_worker(
    settings: Settings,
    concurrency: Option<usize>,
    drain: bool,
    kinds: Vec<JobKind>,
) -> Result<(), CliError> {
    // Creates the file and schema before any worker opens its own connection.
    drop(open_db(&settings)?);

    let db_path = settings.database_path();
    let options = WorkerOptions {
        concurrency: concurrency.unwrap_or(settings.worker.concurrency),
        kinds,
        drain,
    };
    if !options.kinds.is_empty() {
        let names: Vec<&str> = options.kinds.iter().map(|k| k.as_str()).collect();
        log::info!("Claiming only: {}", names.join(", "));
    }

    let pipeline = Arc::new(Pipeline::new(settings));
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::runtime(format!("failed to create tokio runtime: {e}")))?;

    let summary = rt.block_on(async {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Shutting down after current jobs...");
                let _ = tx.send(true);
            }
        });
        run_workers(pipeline, db_path, options, rx).await
    })?;

    log::info!("");
    log::info!("{}", "Summary".if_supports_color(Stdout, |t| t.bold()));
    log::info!(
        "  Done:      {:>6}",
        summary.done.if_supports_color(Stdout, |t| t.green())
    );
    log::info!("  Retried:   {:>6}", summary.retried);
    if summary.failed > 0 {
        log::info!(
            "  Failed:    {:>6}",
            summary.failed.if_supports_color(Stdout, |t| t.red())
        );
    } else {
        log::info!("  Failed:    {:>6}", summary.failed);
    }
    if summary.timed_out > 0 {
        log::warn!("{} job step(s) hit the safety timeout", summary.timed_out);
    }
    Ok(())
}
