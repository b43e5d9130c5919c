//! Error types for combo-eval
//!
//! Errors are split by how far they propagate: configuration, data and
//! experiment errors abort a run, while row and combination errors are
//! recovered by skipping the offending unit.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// combo-eval error types
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid experiment configuration, detected before any data access
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unknown table or field, or not enough rows for the requested split
    #[error("Data error: {0}")]
    Data(String),

    /// A single row could not be used (skipped by callers)
    #[error("Row error: {0}")]
    Row(String),

    /// A combination produced no usable knowledge base or results
    #[error("Combination '{combination}' failed: {reason}")]
    Combination {
        /// Display name of the combination
        combination: String,
        /// What went wrong
        reason: String,
    },

    /// Every combination failed
    #[error("Experiment failed: {0}\nNo combination produced results.")]
    Experiment(String),

    /// The embedding provider rejected a call
    #[error("Embedding provider error: {0}")]
    Provider(String),

    /// Invalid argument to an engine operation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// SQL parse error
    #[error("SQL parse error: {0}")]
    ParseError(String),

    /// Storage error (Parquet/Arrow row sources)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// The caller cancelled the run
    #[error("Experiment cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow/Parquet error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// JSON (config/report) error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a combination error.
    pub fn combination(combination: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Combination {
            combination: combination.into(),
            reason: reason.into(),
        }
    }

    /// Whether the engine recovers from this error by skipping a row or
    /// combination instead of aborting the run.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Row(_) | Self::Combination { .. } | Self::Provider(_)
        )
    }
}
