//! Error types for the Qizx CLI
//!
//! Messages are shown to the user as-is, so each variant says what went
//! wrong and, where there is one, what to try next.

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// Request to the database failed
    #[error("{0}")]
    Qizx(#[from] qizx_api::QizxError),

    /// Bulk transfer could not be set up
    #[error("{0}")]
    Bulk(#[from] qizx_bulk::BulkError),

    /// Command-line value the server would not accept
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Command ran but did not achieve what was asked
    #[error("{0}")]
    Unsuccessful(String),

    /// Local file could not be read or written
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn unsuccessful(msg: impl Into<String>) -> Self {
        Self::Unsuccessful(msg.into())
    }
}
