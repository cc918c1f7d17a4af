//! The ingestion pipeline: scan, hash, match, and catalog maintenance.
//!
//! Every stage is a plain function over a SQLite connection so it can run
//! inline from the CLI or from a queue worker. [`Pipeline`] dispatches queued
//! jobs to the stages and settles their outcome; [`run_workers`] drives a pool
//! of async workers over the durable queue.

pub mod catalog;
pub mod dat_import;
pub mod error;
pub mod hash;
pub mod matcher;
pub mod pipeline;
pub mod progress;
pub mod prune;
pub mod recheck;
pub mod runner;
pub mod scan;
pub mod selection;

pub use catalog::{
    Registration, SOURCE_FETCH, SOURCE_UPLOAD, activate_catalog, deactivate_catalog,
    fetch_platform_catalog, register_dat_file,
};
pub use dat_import::{ImportStats, import_dat_file};
pub use error::{Disposition, PipelineError};
pub use hash::{HashOutcome, artifact_path, hash_artifact};
pub use matcher::{FALLBACK_PROVIDER, MatchOutcome, match_artifact};
pub use pipeline::{JobResult, Pipeline, backoff};
pub use progress::{ImportProgress, LogProgress, SilentProgress};
pub use prune::{PruneStats, prune_dat_files};
pub use recheck::{RecheckStats, recheck_platform};
pub use runner::{RunSummary, WorkerOptions, run_workers};
pub use scan::{ScanStats, scan_library};
pub use selection::{SelectionPreview, commit_selection, preview_selection};
