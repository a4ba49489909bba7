//! Error types for nano-chat.

use thiserror::Error;

/// Result type alias for nano-chat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for nano-chat.
#[derive(Error, Debug)]
pub enum Error {
    /// A parameter or buffer failed validation. The message names the
    /// offending parameter and its bound.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation was invoked in the wrong state, e.g. starting a turn
    /// while another one is in flight.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// Generation was cancelled mid-stream via `cancel_process`.
    #[error("generation cancelled")]
    Cancelled,

    /// Engine-side failure, e.g. context window exhausted.
    #[error("engine error: {0}")]
    Internal(String),

    /// Tensor operation error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check whether this error is a mid-stream cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
