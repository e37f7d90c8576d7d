//! Common error types for the learning-progress services

use thiserror::Error;

/// Common result type for LMS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across LMS crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or empty required field
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists for the given identity
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Store round trip exceeded its bounded wait
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Caller-facing classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    /// Store unavailable or slow; the caller may retry
    TransientStore,
    Internal,
}

impl Error {
    /// Classify this error for callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Database(sqlx::Error::RowNotFound) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Database(_) | Error::Io(_) | Error::Timeout(_) => ErrorKind::TransientStore,
            Error::Config(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True when retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientStore
    }
}

/// Reject empty or whitespace-only identifiers and required text fields
pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} is required", field)));
    }
    Ok(())
}
