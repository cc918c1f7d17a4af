//! Domain types shared by every romshelf crate.
//!
//! Nothing in here performs I/O: these are the entities the pipeline reads
//! and writes (platforms, libraries, catalog files, artifacts, games,
//! releases, audit entries) and the job payloads carried by the queue.

pub mod job;
pub mod model;

pub use job::{Job, JobKind, JobStatus, QueuedJob};
pub use model::{
    ActivityEntry, ActivityKind, Artifact, ArtifactState, CatalogEntry, CatalogFile,
    CatalogRecord, Game, Library, NewActivity, Platform, Release, normalize_extension,
};

/// Returned when a stored enum label does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
