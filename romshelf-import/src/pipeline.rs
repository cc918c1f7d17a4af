//! Job dispatch: run one queued job and record its outcome.

use std::sync::Arc;
use std::time::Duration;

use romshelf_core::{Job, JobKind, NewActivity, QueuedJob};
use romshelf_dat::{ArchiveExtractor, SystemExtractor};
use romshelf_db::{append_activity, claim_next, complete_job, fail_job};
use romshelf_lib::Settings;
use rusqlite::Connection;
use serde_json::json;

use crate::catalog::fetch_platform_catalog;
use crate::dat_import::import_dat_file;
use crate::error::{Disposition, PipelineError};
use crate::hash::hash_artifact;
use crate::progress::LogProgress;
use crate::prune::prune_dat_files;
use crate::recheck::recheck_platform;
use crate::scan::scan_library;

/// What happened to a claimed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult {
    Done,
    /// Failed, rescheduled after `delay`.
    Retrying { delay: Duration },
    /// Failed for good; an error activity carries the retry job.
    Failed { error: String },
}

/// Everything a job needs besides its database connection.
pub struct Pipeline {
    settings: Settings,
    extractor: Arc<dyn ArchiveExtractor>,
}

impl Pipeline {
    /// A pipeline using the system archive extractor.
    pub fn new(settings: Settings) -> Self {
        let extractor = Arc::new(SystemExtractor::new(settings.dat.archive_timeout()));
        Self::with_extractor(settings, extractor)
    }

    pub fn with_extractor(settings: Settings, extractor: Arc<dyn ArchiveExtractor>) -> Self {
        Self {
            settings,
            extractor,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn extractor(&self) -> &dyn ArchiveExtractor {
        self.extractor.as_ref()
    }

    /// Run the stage a job names.
    pub fn run_job(&self, conn: &Connection, job: &Job) -> Result<(), PipelineError> {
        log::debug!("Running {}", job);
        match job {
            Job::Scan { library_id } => {
                scan_library(conn, *library_id, &self.settings.scan.ignore)?;
            }
            Job::Hash { artifact_id } => {
                hash_artifact(conn, *artifact_id)?;
            }
            Job::DatImport { dat_file_id } => {
                import_dat_file(
                    conn,
                    *dat_file_id,
                    self.extractor(),
                    self.settings.dat.import_batch_size,
                    Some(&LogProgress),
                )?;
            }
            Job::DatRecheck { platform_id } => {
                recheck_platform(conn, platform_id)?;
            }
            Job::DatPrune { keep_count } => {
                let keep = keep_count.unwrap_or(self.settings.dat_prune_keep);
                prune_dat_files(conn, keep)?;
            }
            Job::DatFetch { platform_id } => {
                fetch_platform_catalog(conn, &self.settings, platform_id)?;
            }
        }
        Ok(())
    }

    /// Run a claimed job and settle it in the queue: complete it, reschedule
    /// it with exponential backoff, or mark it failed with an error activity
    /// that can re-enqueue it later.
    pub fn execute(&self, conn: &Connection, queued: &QueuedJob) -> Result<JobResult, PipelineError> {
        let err = match self.run_job(conn, &queued.job) {
            Ok(()) => {
                complete_job(conn, queued.id)?;
                return Ok(JobResult::Done);
            }
            Err(e) => e,
        };

        let worker = &self.settings.worker;
        let retryable = err.disposition() == Disposition::Retry;
        if retryable && queued.attempts < worker.max_attempts {
            let delay = backoff(worker.backoff_base_secs, queued.attempts);
            log::warn!(
                "{} failed (attempt {}/{}), retrying in {}s: {}",
                queued.job,
                queued.attempts,
                worker.max_attempts,
                delay.as_secs(),
                err
            );
            fail_job(conn, queued.id, &err.to_string(), Some(delay))?;
            return Ok(JobResult::Retrying { delay });
        }

        log::error!("{} failed: {}", queued.job, err);
        let message = err.to_string();
        fail_job(conn, queued.id, &message, None)?;
        append_activity(
            conn,
            &NewActivity::error(
                queued.job.kind().as_str(),
                format!("{} failed: {}", queued.job, message),
                queued.job.clone(),
            )
            .details(json!({
                "jobId": queued.id,
                "attempts": queued.attempts,
                "retryable": retryable,
            })),
        )?;
        Ok(JobResult::Failed { error: message })
    }

    /// Claim and execute due jobs one at a time until none is left.
    /// Returns the number of jobs executed.
    pub fn run_pending(&self, conn: &Connection, kinds: &[JobKind]) -> Result<usize, PipelineError> {
        let mut executed = 0;
        while let Some(queued) = claim_next(conn, kinds, self.settings.worker.safety_timeout())? {
            self.execute(conn, &queued)?;
            executed += 1;
        }
        Ok(executed)
    }
}

/// Longest delay between two attempts of a job.
const MAX_BACKOFF: Duration = Duration::from_secs(24 * 60 * 60);

/// Delay before retry number `attempts`: `base * 2^(attempts - 1)`, capped
/// at one day.
pub fn backoff(base_secs: u64, attempts: u32) -> Duration {
    let exponent = attempts.saturating_sub(1).min(32);
    Duration::from_secs(base_secs.saturating_mul(1u64 << exponent)).min(MAX_BACKOFF)
}
