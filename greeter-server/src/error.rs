//! Server error types.

use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("core error: {0}")]
    Core(#[from] greeter_core::CoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("server shutting down")]
    ShuttingDown,
}

impl From<greeter_storage::StorageError> for ServerError {
    fn from(e: greeter_storage::StorageError) -> Self {
        ServerError::Core(e.into())
    }
}

impl ServerError {
    /// Returns the code sent in `error` responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::Io(_) => "INTERNAL_ERROR",
            ServerError::Core(e) => e.error_code(),
            ServerError::Json(_) => "BAD_REQUEST",
            ServerError::InvalidRequest(_) => "BAD_REQUEST",
            ServerError::ShuttingDown => "SHUTTING_DOWN",
        }
    }

    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServerError::Io(_) | ServerError::ShuttingDown => true,
            ServerError::Core(e) => e.is_retryable(),
            ServerError::Json(_) | ServerError::InvalidRequest(_) => false,
        }
    }
}
