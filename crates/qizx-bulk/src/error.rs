//! Error types for bulk transfers

use qizx_api::QizxError;
use thiserror::Error;

/// Result type alias for bulk transfer operations
pub type Result<T> = std::result::Result<T, BulkError>;

#[derive(Error, Debug)]
pub enum BulkError {
    /// Library or archive could not be listed; aborts the run
    #[error("Enumeration of {scope} failed: {reason}")]
    Enumeration { scope: String, reason: String },

    /// Remote store could not be reached at startup
    #[error("Cannot connect to database: {0}")]
    Connection(String),

    /// Remote store rejected or failed a single operation
    #[error(transparent)]
    Remote(#[from] QizxError),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Archive entry not found: {0}")]
    EntryNotFound(String),

    /// Entry name does not follow the archive layout
    #[error("Invalid archive entry name: {0}")]
    InvalidEntry(String),

    /// Archive writer is gone; nothing more can be archived
    #[error("Archive queue closed")]
    QueueClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid property set: {0}")]
    Json(#[from] serde_json::Error),
}

impl BulkError {
    pub fn enumeration(scope: impl Into<String>, reason: impl ToString) -> Self {
        BulkError::Enumeration {
            scope: scope.into(),
            reason: reason.to_string(),
        }
    }

    pub fn archive(msg: impl Into<String>) -> Self {
        BulkError::Archive(msg.into())
    }

    /// Whether a worker hitting this error must stop instead of skipping the job.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BulkError::QueueClosed)
    }
}
