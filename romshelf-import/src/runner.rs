//! Async worker runner.
//!
//! Spawns N persistent tokio tasks. Each owns one SQLite connection and
//! repeatedly claims a job from the durable queue, runs it on the blocking
//! pool under a safety timeout, and settles it. The queue table is the only
//! coordination point between workers.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use romshelf_core::JobKind;
use romshelf_db::{claim_next, job_counts, open_database, requeue_expired};
use romshelf_lib::WorkerSettings;
use rusqlite::Connection;
use tokio::sync::watch;

use crate::error::PipelineError;
use crate::pipeline::{JobResult, Pipeline};

/// How the runner should behave.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub concurrency: usize,
    /// Job kinds to claim; empty claims every kind.
    pub kinds: Vec<JobKind>,
    /// Stop once no job is due and none is running.
    pub drain: bool,
}

/// Totals across all workers of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub done: usize,
    pub retried: usize,
    pub failed: usize,
    /// Job steps abandoned after the safety timeout.
    pub timed_out: usize,
}

impl RunSummary {
    fn add(&mut self, other: RunSummary) {
        self.done += other.done;
        self.retried += other.retried;
        self.failed += other.failed;
        self.timed_out += other.timed_out;
    }
}

/// Result of one blocking worker step.
enum Step {
    Ran(JobResult),
    Idle { running: usize },
}

/// Run workers until `shutdown` flips to true or, in drain mode, the queue
/// is empty.
pub async fn run_workers(
    pipeline: Arc<Pipeline>,
    db_path: PathBuf,
    options: WorkerOptions,
    shutdown: watch::Receiver<bool>,
) -> Result<RunSummary, PipelineError> {
    let concurrency = options.concurrency.max(1);
    log::info!(
        "Starting {} worker(s){}",
        concurrency,
        if options.drain { " in drain mode" } else { "" }
    );

    let handles: Vec<_> = (0..concurrency)
        .map(|index| {
            let pipeline = pipeline.clone();
            let db_path = db_path.clone();
            let options = options.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(worker_loop(index, pipeline, db_path, options, shutdown))
        })
        .collect();

    let mut summary = RunSummary::default();
    for joined in join_all(handles).await {
        match joined {
            Ok(Ok(worker)) => summary.add(worker),
            Ok(Err(e)) => return Err(e),
            Err(join_err) => return Err(PipelineError::Task(join_err.to_string())),
        }
    }

    log::info!(
        "Workers stopped: {} done, {} retried, {} failed",
        summary.done,
        summary.retried,
        summary.failed
    );
    Ok(summary)
}

async fn worker_loop(
    index: usize,
    pipeline: Arc<Pipeline>,
    db_path: PathBuf,
    options: WorkerOptions,
    mut shutdown: watch::Receiver<bool>,
) -> Result<RunSummary, PipelineError> {
    let settings = pipeline.settings().worker.clone();
    let safety_timeout = settings.safety_timeout();
    let kinds = Arc::new(options.kinds);
    let mut conn: Option<Connection> = None;
    let mut summary = RunSummary::default();

    loop {
        if *shutdown.borrow() {
            break;
        }

        let current = match conn.take() {
            Some(c) => c,
            None => match open_database(&db_path) {
                Ok(c) => c,
                Err(e) => {
                    log::error!("Worker {}: cannot open {}: {}", index, db_path.display(), e);
                    idle(&settings, &mut shutdown).await;
                    continue;
                }
            },
        };
        let step_pipeline = pipeline.clone();
        let step_kinds = kinds.clone();
        let task = tokio::task::spawn_blocking(move || {
            let result = step(&step_pipeline, &current, &step_kinds);
            (current, result)
        });

        match tokio::time::timeout(safety_timeout, task).await {
            Ok(Ok((returned, result))) => {
                conn = Some(returned);
                match result {
                    Ok(Step::Ran(JobResult::Done)) => summary.done += 1,
                    Ok(Step::Ran(JobResult::Retrying { .. })) => summary.retried += 1,
                    Ok(Step::Ran(JobResult::Failed { .. })) => summary.failed += 1,
                    Ok(Step::Idle { running }) => {
                        if options.drain && running == 0 {
                            log::debug!("Worker {} found the queue drained", index);
                            break;
                        }
                        idle(&settings, &mut shutdown).await;
                    }
                    Err(e) => {
                        // Queue bookkeeping failed (typically a locked database).
                        log::error!("Worker {}: {}", index, e);
                        idle(&settings, &mut shutdown).await;
                    }
                }
            }
            Ok(Err(join_err)) => {
                // The connection went down with the panicked task; reopen next round.
                log::error!("Worker {} task panicked: {}", index, join_err);
                summary.failed += 1;
            }
            Err(_) => {
                log::warn!(
                    "Worker {}: job exceeded {}s safety timeout, abandoning it",
                    index,
                    safety_timeout.as_secs()
                );
                summary.timed_out += 1;
            }
        }
    }

    Ok(summary)
}

/// Wait one poll interval, or less if shutdown is requested.
async fn idle(settings: &WorkerSettings, shutdown: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = tokio::time::sleep(settings.poll_interval()) => {}
        Ok(()) = shutdown.changed() => {}
    }
}

/// Claim and run at most one job.
fn step(pipeline: &Pipeline, conn: &Connection, kinds: &[JobKind]) -> Result<Step, PipelineError> {
    let lease = pipeline.settings().worker.safety_timeout();
    match claim_next(conn, kinds, lease)? {
        Some(queued) => Ok(Step::Ran(pipeline.execute(conn, &queued)?)),
        None => {
            requeue_expired(conn)?;
            let running = job_counts(conn)?.running;
            Ok(Step::Idle { running })
        }
    }
}
