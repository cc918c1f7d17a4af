use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;
use rusqlite::Connection;

use romshelf_core::JobStatus;
use romshelf_db::list_jobs;

use super::truncate_str;
use crate::error::CliError;

pub(crate) fn run_jobs_list(
    conn: &Connection,
    status: Option<JobStatus>,
    limit: usize,
) -> Result<(), CliError> {
    let jobs = list_jobs(conn, status, limit)?;
    if jobs.is_empty() {
        log::info!("No jobs.");
        return Ok(());
    }

    for q in &jobs {
        let status = match q.status {
            JobStatus::Failed => q
                .status
                .as_str()
                .if_supports_color(Stdout, |t| t.red())
                .to_string(),
            JobStatus::Running => q
                .status
                .as_str()
                .if_supports_color(Stdout, |t| t.yellow())
                .to_string(),
            JobStatus::Done => q
                .status
                .as_str()
                .if_supports_color(Stdout, |t| t.green())
                .to_string(),
            JobStatus::Queued => q.status.as_str().to_string(),
        };
        log::info!(
            "{:>6}  {:<8} {:<28} attempts {}  after {}",
            q.id,
            status,
            q.job.to_string(),
            q.attempts,
            q.run_after.if_supports_color(Stdout, |t| t.dimmed()),
        );
        if let Some(err) = &q.last_error {
            log::info!(
                "        {}",
                truncate_str(err, 100).if_supports_color(Stdout, |t| t.dimmed())
            );
        }
    }
    Ok(())
}
