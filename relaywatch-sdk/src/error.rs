//! Error types for the stats engine.

use thiserror::Error;

/// Errors returned by construction and explicit persistence calls.
///
/// Ingest and query paths never return errors; they count drops and degrade
/// to empty results instead.
#[derive(Debug, Error)]
pub enum StatsError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to encode or decode JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A series spec failed validation.
    #[error("Invalid spec for series '{series}': {reason}")]
    InvalidSpec {
        /// Series name the spec was registered for.
        series: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Engine configuration is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The history log lost its backing file and runs in memory only.
    #[error("History log degraded to memory-only mode: {0}")]
    Degraded(String),

    /// The radio driver could not be read.
    #[error("Radio read failed: {0}")]
    Radio(String),
}

impl StatsError {
    pub(crate) fn invalid_spec(series: &str, reason: impl Into<String>) -> Self {
        StatsError::InvalidSpec {
            series: series.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, StatsError>;
