use romshelf_db::{OperationError, SchemaError};
use romshelf_import::PipelineError;
use romshelf_lib::SettingsError;
use thiserror::Error;

/// Errors that can occur during CLI command execution.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Settings file could not be read or written
    #[error("Config error: {0}")]
    Settings(#[from] SettingsError),

    /// Database could not be opened
    #[error("Database error: {0}")]
    Schema(#[from] SchemaError),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] OperationError),

    /// A pipeline stage run inline failed
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// Referenced entity does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Arguments are well-formed but unusable
    #[error("{0}")]
    Invalid(String),

    /// Runtime creation or async error
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl CliError {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub(crate) fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }
}
