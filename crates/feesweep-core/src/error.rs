//! Error taxonomy for FeeSweep.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SweepError>;

#[derive(Debug, Error)]
pub enum SweepError {
    /// Transport or RPC-level failure of a single network call. Retryable.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The batched balance query for a whole chunk failed.
    #[error("Batch balance query failed: {0}")]
    BatchQuery(String),

    /// A scheduled job was started while it was already running.
    #[error("Job '{0}' is already running")]
    AlreadyRunning(String),

    #[error("'{label}' failed after {attempts} attempts: {last}")]
    RetryExhausted {
        label: String,
        attempts: u32,
        last: Box<SweepError>,
    },

    #[error("Chunk size must be at least 1 (got {0})")]
    InvalidChunkSize(usize),

    #[error("Invalid retry policy: {0}")]
    InvalidRetryPolicy(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Price API error: {0}")]
    PriceApi(String),

    #[error("Swap error: {0}")]
    Swap(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SweepError {
    /// The innermost human-readable message, without retry annotations.
    pub fn extract_message(&self) -> String {
        match self {
            SweepError::RetryExhausted { last, .. } => last.extract_message(),
            SweepError::Transport(msg)
            | SweepError::BatchQuery(msg)
            | SweepError::Config(msg)
            | SweepError::PriceApi(msg)
            | SweepError::Swap(msg)
            | SweepError::InvalidRetryPolicy(msg)
            | SweepError::InvalidSchedule(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
