use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;
use rusqlite::Connection;

use romshelf_core::ActivityKind;
use romshelf_db::{ActivityFilter, list_activity, remove_activity, retry_activity};

use super::truncate_str;
use crate::error::CliError;

pub(crate) fn run_activity_list(
    conn: &Connection,
    offset: usize,
    limit: usize,
    kind: Option<ActivityKind>,
    module: Option<String>,
) -> Result<(), CliError> {
    let entries = list_activity(
        conn,
        &ActivityFilter {
            offset,
            limit,
            kind,
            module,
        },
    )?;
    if entries.is_empty() {
        log::info!("No activity.");
        return Ok(());
    }

    for entry in &entries {
        let kind = match entry.kind {
            ActivityKind::Error => entry
                .kind
                .as_str()
                .if_supports_color(Stdout, |t| t.red())
                .to_string(),
            ActivityKind::Match => entry
                .kind
                .as_str()
                .if_supports_color(Stdout, |t| t.green())
                .to_string(),
            _ => entry
                .kind
                .as_str()
                .if_supports_color(Stdout, |t| t.cyan())
                .to_string(),
        };
        log::info!(
            "{:>6}  {}  {:<6} {:<10} {}{}",
            entry.id,
            entry.timestamp.if_supports_color(Stdout, |t| t.dimmed()),
            kind,
            entry.module,
            truncate_str(&entry.message, 100),
            if entry.retry.is_some() {
                format!(" {}", "[retry]".if_supports_color(Stdout, |t| t.yellow()))
            } else {
                String::new()
            },
        );
        log::debug!("        details: {}", entry.details);
    }
    Ok(())
}

pub(crate) fn run_activity_retry(conn: &Connection, id: i64) -> Result<(), CliError> {
    let job = retry_activity(conn, id)?;
    log::info!(
        "Re-enqueued activity {} as job {}",
        id,
        job.if_supports_color(Stdout, |t| t.bold())
    );
    Ok(())
}

pub(crate) fn run_activity_ack(conn: &Connection, id: i64) -> Result<(), CliError> {
    remove_activity(conn, id)?;
    log::info!("Acknowledged activity {}", id);
    Ok(())
}
