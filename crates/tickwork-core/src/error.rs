//! Core error types for tickwork-core.
//!
//! Errors are split by how far they are allowed to travel:
//! - [`TaskError`] is produced by task bodies and is caught at the task
//!   boundary (except its `Config` variant).
//! - [`ConfigError`] signals a programming or configuration mistake and is
//!   never swallowed.
//! - [`CoreError`] is the top-level error for everything else.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for tickwork-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A task body failed outside of the scheduler (e.g. a one-off CLI run)
    #[error("Task '{label}' failed: {source}")]
    Task {
        label: String,
        #[source]
        source: TaskError,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Dot-path key that does not exist in the configuration
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Activity category that has no indicators
    #[error("Unknown activity category: '{0}'")]
    UnknownCategory(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Failure of a single task body.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Misconfiguration discovered while running; propagated, not caught.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Task body panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

impl TaskError {
    /// Shorthand for an ad hoc body failure.
    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed(message.into())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_passes_through_task_error_display() {
        let err = TaskError::from(ConfigError::UnknownCategory("cooking".into()));
        assert_eq!(err.to_string(), "Unknown activity category: 'cooking'");
    }

    #[test]
    fn task_error_failed_shorthand() {
        let err = TaskError::failed("session expired");
        assert!(matches!(err, TaskError::Failed(ref m) if m == "session expired"));
    }
}
