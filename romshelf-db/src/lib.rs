//! SQLite persistence layer for the ingestion pipeline.
//!
//! Provides schema creation, the durable job queue, the activity log, and
//! the write operations and read queries for every pipeline entity,
//! backed by SQLite (via rusqlite with bundled feature).

use std::time::Duration;

use chrono::{SecondsFormat, Utc};

pub mod activity;
pub mod jobs;
pub mod operations;
pub mod queries;
pub mod schema;

pub use activity::{
    ActivityFilter, append_activity, get_activity, list_activity, remove_activity,
    retry_activity,
};
pub use jobs::{
    JobCounts, claim_next, complete_job, enqueue, enqueue_unique, enqueue_unique_queued, fail_job,
    job_counts, list_jobs, requeue_expired,
};
pub use operations::{
    NewDatFile, OperationError, activate_dat_file, deactivate_dat_file, delete_dat_file,
    delete_library, delete_release_if_orphaned, find_or_create_game, find_or_create_release,
    insert_artifact, insert_dat_file, insert_library, link_artifact, mark_library_scanned,
    record_artifact_hashes, reset_artifact, set_artifact_group, set_dat_file_version,
    set_preferred_artifact, upsert_dat_entries, upsert_platform,
};
pub use queries::{
    CandidateRow, DuplicateGame, StateCount, artifact_state_counts, artifacts_for_recheck,
    artifacts_in_library, count_dat_entries, duplicate_games, find_artifact,
    find_dat_file_by_sha256, find_entry_by_hash, get_artifact, get_dat_file,
    get_game, get_library, get_platform, get_release, list_dat_entries, list_dat_files,
    list_libraries, list_platforms, selection_candidates, sidecars_in_directory,
};
pub use schema::{SchemaError, open_database, open_memory};

/// Current UTC time as an RFC 3339 timestamp with millisecond precision.
///
/// Every timestamp column uses this format so they sort lexically.
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Timestamp `delay` from now, in the same format as [`now`].
pub fn now_plus(delay: Duration) -> String {
    let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
    let at = Utc::now()
        .checked_add_signed(delay)
        .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
