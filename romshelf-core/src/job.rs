//! Job payloads carried by the durable queue.
//!
//! Payloads serialize to tagged JSON (`{"type":"scan","libraryId":3}`) so
//! the same value can be stored in the queue table and embedded as a retry
//! descriptor in an activity entry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::UnknownVariant;

/// One unit of pipeline work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Job {
    /// Walk a library and record every file it contains.
    Scan { library_id: i64 },
    /// Fingerprint one artifact, group it, and match it.
    Hash { artifact_id: i64 },
    /// Parse a stored catalog file into entries.
    DatImport { dat_file_id: i64 },
    /// Re-match unmatched artifacts after a catalog change.
    DatRecheck { platform_id: String },
    /// Delete superseded catalog files, keeping the newest `keep_count`.
    DatPrune {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        keep_count: Option<usize>,
    },
    /// Download a platform's catalog from its configured source URL.
    DatFetch { platform_id: String },
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self {
            Job::Scan { .. } => JobKind::Scan,
            Job::Hash { .. } => JobKind::Hash,
            Job::DatImport { .. } => JobKind::DatImport,
            Job::DatRecheck { .. } => JobKind::DatRecheck,
            Job::DatPrune { .. } => JobKind::DatPrune,
            Job::DatFetch { .. } => JobKind::DatFetch,
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Job::Scan { library_id } => write!(f, "scan(library {library_id})"),
            Job::Hash { artifact_id } => write!(f, "hash(artifact {artifact_id})"),
            Job::DatImport { dat_file_id } => write!(f, "datImport(dat {dat_file_id})"),
            Job::DatRecheck { platform_id } => write!(f, "datRecheck({platform_id})"),
            Job::DatPrune { keep_count: Some(n) } => write!(f, "datPrune(keep {n})"),
            Job::DatPrune { keep_count: None } => f.write_str("datPrune"),
            Job::DatFetch { platform_id } => write!(f, "datFetch({platform_id})"),
        }
    }
}

/// The queue name of a job, used to route work to workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobKind {
    Scan,
    Hash,
    DatImport,
    DatRecheck,
    DatPrune,
    DatFetch,
}

impl JobKind {
    pub const ALL: &'static [JobKind] = &[
        JobKind::Scan,
        JobKind::Hash,
        JobKind::DatImport,
        JobKind::DatRecheck,
        JobKind::DatPrune,
        JobKind::DatFetch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Scan => "scan",
            JobKind::Hash => "hash",
            JobKind::DatImport => "datImport",
            JobKind::DatRecheck => "datRecheck",
            JobKind::DatPrune => "datPrune",
            JobKind::DatFetch => "datFetch",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownVariant::new("job kind", s))
    }
}

/// Lifecycle of a queued job row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub const ALL: &'static [JobStatus] = &[
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Done,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownVariant::new("job status", s))
    }
}

/// A job row as stored in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub id: i64,
    pub job: Job,
    pub status: JobStatus,
    pub attempts: u32,
    pub run_after: String,
    pub last_error: Option<String>,
    pub created_at: String,
}
