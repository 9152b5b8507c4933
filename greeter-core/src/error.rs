//! Core error types.

use std::time::Duration;
use thiserror::Error;

/// Errors from the membership store and transition engine.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("persisted state is unreadable: {reason}")]
    Decode { reason: String },

    #[error("kick threshold ({kick:?}) must not be shorter than notify threshold ({notify:?})")]
    InvalidThresholds { notify: Duration, kick: Duration },
}

impl CoreError {
    /// Returns whether this error indicates the operation can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Io(_))
    }

    /// Returns an error code suitable for protocol responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::Io(_) => "STATE_IO_ERROR",
            CoreError::Decode { .. } => "STATE_CORRUPT",
            CoreError::InvalidThresholds { .. } => "BAD_CONFIG",
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Decode {
            reason: e.to_string(),
        }
    }
}
