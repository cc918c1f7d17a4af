//! Durable job queue.
//!
//! Jobs are rows in the `jobs` table. A worker claims one by atomically
//! flipping it from `queued` to `running` with a lease; a crashed worker's
//! lease expires and [`requeue_expired`] hands the job to someone else.
//! Delivery is at-least-once, so every stage must be idempotent.

use std::time::Duration;

use romshelf_core::{Job, JobKind, JobStatus, QueuedJob};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::operations::OperationError;
use crate::queries::{json_column, parse_column};
use crate::{now, now_plus};

const JOB_COLUMNS: &str = "id, payload, status, attempts, run_after, last_error, created_at";

/// Add a job to the queue, runnable immediately. Returns the job ID.
pub fn enqueue(conn: &Connection, job: &Job) -> Result<i64, OperationError> {
    let payload = serde_json::to_string(job)?;
    let ts = now();
    conn.execute(
        "INSERT INTO jobs (kind, payload, status, attempts, run_after, created_at, updated_at)
         VALUES (?1, ?2, 'queued', 0, ?3, ?3, ?3)",
        params![job.kind().as_str(), payload, ts],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Add a job unless an identical payload is already queued or running.
///
/// Returns the new job ID, or `None` when an equivalent job was pending.
pub fn enqueue_unique(conn: &Connection, job: &Job) -> Result<Option<i64>, OperationError> {
    enqueue_unless(conn, job, "status IN ('queued', 'running')")
}

/// Add a job unless an identical payload is waiting to be claimed.
///
/// A running copy does not count: it read its inputs before the caller's
/// change, so the change still needs a fresh run.
pub fn enqueue_unique_queued(conn: &Connection, job: &Job) -> Result<Option<i64>, OperationError> {
    enqueue_unless(conn, job, "status = 'queued'")
}

fn enqueue_unless(
    conn: &Connection,
    job: &Job,
    status_filter: &str,
) -> Result<Option<i64>, OperationError> {
    let payload = serde_json::to_string(job)?;
    let pending: bool = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM jobs WHERE payload = ?1 AND {status_filter})"),
        params![payload],
        |row| row.get(0),
    )?;
    if pending {
        log::debug!("Skipping duplicate job {}", job);
        return Ok(None);
    }
    enqueue(conn, job).map(Some)
}

/// Claim the oldest due job of one of `kinds` (any kind when empty).
///
/// The row is marked `running`, its attempt counter incremented, and a
/// lease of `lease` taken out on it, all in one statement.
pub fn claim_next(
    conn: &Connection,
    kinds: &[JobKind],
    lease: Duration,
) -> Result<Option<QueuedJob>, OperationError> {
    let ts = now();
    let mut values = vec![now_plus(lease), ts];
    let kind_filter = if kinds.is_empty() {
        String::new()
    } else {
        let placeholders: Vec<String> = (0..kinds.len()).map(|i| format!("?{}", i + 3)).collect();
        values.extend(kinds.iter().map(|k| k.as_str().to_string()));
        format!("AND kind IN ({})", placeholders.join(", "))
    };

    let sql = format!(
        "UPDATE jobs SET status = 'running', attempts = attempts + 1,
             locked_until = ?1, updated_at = ?2
         WHERE id = (
             SELECT id FROM jobs
             WHERE status = 'queued' AND run_after <= ?2 {kind_filter}
             ORDER BY run_after, id
             LIMIT 1
         )
         RETURNING {JOB_COLUMNS}"
    );
    conn.query_row(&sql, params_from_iter(values.iter()), row_to_job)
        .optional()
        .map_err(Into::into)
}

/// Mark a claimed job finished.
pub fn complete_job(conn: &Connection, id: i64) -> Result<(), OperationError> {
    let changed = conn.execute(
        "UPDATE jobs SET status = 'done', locked_until = NULL, last_error = NULL, updated_at = ?2
         WHERE id = ?1",
        params![id, now()],
    )?;
    if changed == 0 {
        return Err(OperationError::not_found("job", id));
    }
    Ok(())
}

/// Record a failed attempt.
///
/// With `retry_after` the job goes back to `queued` and becomes due after
/// the delay; without it the job is marked `failed` for good.
pub fn fail_job(
    conn: &Connection,
    id: i64,
    error: &str,
    retry_after: Option<Duration>,
) -> Result<(), OperationError> {
    let changed = match retry_after {
        Some(delay) => conn.execute(
            "UPDATE jobs SET status = 'queued', run_after = ?3, locked_until = NULL,
                 last_error = ?2, updated_at = ?4
             WHERE id = ?1",
            params![id, error, now_plus(delay), now()],
        )?,
        None => conn.execute(
            "UPDATE jobs SET status = 'failed', locked_until = NULL, last_error = ?2, updated_at = ?3
             WHERE id = ?1",
            params![id, error, now()],
        )?,
    };
    if changed == 0 {
        return Err(OperationError::not_found("job", id));
    }
    Ok(())
}

/// Return running jobs whose lease has expired to the queue. Returns the
/// number of jobs requeued.
pub fn requeue_expired(conn: &Connection) -> Result<usize, OperationError> {
    let ts = now();
    let changed = conn.execute(
        "UPDATE jobs SET status = 'queued', locked_until = NULL, updated_at = ?1
         WHERE status = 'running' AND locked_until IS NOT NULL AND locked_until < ?1",
        params![ts],
    )?;
    if changed > 0 {
        log::warn!("Requeued {} job(s) with an expired lease", changed);
    }
    Ok(changed)
}

/// Jobs in a status (all statuses when `None`), newest first.
pub fn list_jobs(
    conn: &Connection,
    status: Option<JobStatus>,
    limit: usize,
) -> Result<Vec<QueuedJob>, OperationError> {
    let sql = format!(
        "SELECT {JOB_COLUMNS} FROM jobs
         WHERE ?1 IS NULL OR status = ?1
         ORDER BY id DESC
         LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![status.map(|s| s.as_str()), limit as i64],
        row_to_job,
    )?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// Number of jobs per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub queued: usize,
    pub running: usize,
    pub done: usize,
    pub failed: usize,
}

impl JobCounts {
    /// Jobs still waiting for or holding a worker.
    pub fn pending(&self) -> usize {
        self.queued + self.running
    }
}

pub fn job_counts(conn: &Connection) -> Result<JobCounts, OperationError> {
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")?;
    let rows = stmt.query_map([], |row| {
        let status: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        Ok((parse_column::<JobStatus>(0, status)?, count as usize))
    })?;

    let mut counts = JobCounts::default();
    for row in rows {
        let (status, count) = row?;
        match status {
            JobStatus::Queued => counts.queued = count,
            JobStatus::Running => counts.running = count,
            JobStatus::Done => counts.done = count,
            JobStatus::Failed => counts.failed = count,
        }
    }
    Ok(counts)
}

fn row_to_job(row: &Row) -> rusqlite::Result<QueuedJob> {
    let payload: String = row.get(1)?;
    let status: String = row.get(2)?;
    Ok(QueuedJob {
        id: row.get(0)?,
        job: json_column(1, &payload)?,
        status: parse_column(2, status)?,
        attempts: row.get(3)?,
        run_after: row.get(4)?,
        last_error: row.get(5)?,
        created_at: row.get(6)?,
    })
}
