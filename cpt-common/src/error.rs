//! Common error types for the progress tracker

use thiserror::Error;

/// Common result type for progress tracker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by ingestion, reconciliation and the HTTP layer
#[derive(Error, Debug)]
pub enum Error {
    /// Expected header row, column or sheet label absent from an upload
    #[error("Schema error: {0}")]
    Schema(String),

    /// File structurally unreadable or required sheet missing
    #[error("Parse error: {0}")]
    Parse(String),

    /// Required caller-supplied field absent or malformed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced stored artifact absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// External completion service failure
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors caused by the caller's input rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Schema(_) | Error::Parse(_) | Error::Validation(_)
        )
    }
}
