//! Storage error types.

use greeter_core::CoreError;
use thiserror::Error;

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("data corruption: {0}")]
    Corruption(String),

    #[error("unsupported state format version {0}")]
    UnsupportedVersion(u32),
}

impl From<StorageError> for CoreError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Io(e) => CoreError::Io(e),
            other => CoreError::Decode {
                reason: other.to_string(),
            },
        }
    }
}
