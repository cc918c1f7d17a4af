use thiserror::Error;

/// Errors raised while walking a library root.
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("Invalid ignore pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Errors raised while loading or saving `settings.toml`.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}
