use romshelf_dat::DatError;
use romshelf_db::{OperationError, SchemaError};
use romshelf_lib::WalkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Db(#[from] OperationError),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("Catalog error: {0}")]
    Dat(#[from] DatError),
    #[error("Walk error: {0}")]
    Walk(#[from] WalkError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Worker task failed: {0}")]
    Task(String),
}

/// What the queue should do with a job that returned an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Mark the job failed; running it again cannot succeed.
    Fatal,
    /// Reschedule with backoff.
    Retry,
}

impl PipelineError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Validation and not-found errors are final; I/O, subprocess, network
    /// and lock errors are worth another attempt.
    pub fn disposition(&self) -> Disposition {
        match self {
            PipelineError::NotFound { .. } | PipelineError::Validation(_) => Disposition::Fatal,
            PipelineError::Db(OperationError::NotFound { .. })
            | PipelineError::Db(OperationError::Invalid(_))
            | PipelineError::Db(OperationError::Json(_)) => Disposition::Fatal,
            PipelineError::Dat(e) if e.is_validation() => Disposition::Fatal,
            PipelineError::Walk(WalkError::Pattern { .. }) => Disposition::Fatal,
            PipelineError::Schema(SchemaError::VersionMismatch { .. }) => Disposition::Fatal,
            _ => Disposition::Retry,
        }
    }
}
