//! Error types for fanout-pipeline
//!
//! Per-item failures are reported as [`WorkerError`] values inside run results.
//! [`Error`] is what a pipeline entry point returns when a whole run fails: the
//! first worker failure of a fail-fast run, a rejected run during shutdown, or
//! an invalid configuration.

use thiserror::Error;

use crate::types::WorkerError;

/// Result type alias for fanout-pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fanout-pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrency")
        key: Option<String>,
    },

    /// The external worker failed for one item
    #[error("worker error: {0}")]
    Worker(#[from] WorkerError),

    /// The run was cancelled before every item produced an outcome
    #[error("run cancelled before completion")]
    Cancelled,

    /// Shutdown in progress - not accepting new runs
    #[error("shutdown in progress: not accepting new runs")]
    ShuttingDown,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a configuration error for the given key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// The worker failure carried by this error, if any
    pub fn worker_error(&self) -> Option<&WorkerError> {
        match self {
            Error::Worker(e) => Some(e),
            _ => None,
        }
    }
}
