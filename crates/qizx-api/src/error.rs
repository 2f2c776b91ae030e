//! Error types for the Qizx REST binding
//!
//! Server-side failures arrive as `text/x-qizx-error` bodies of the form
//! `Kind: message`; each known kind has its own variant so that callers can
//! tell a missing document from a refused request.

use thiserror::Error;

/// Result type alias for Qizx client operations
pub type Result<T> = std::result::Result<T, QizxError>;

#[derive(Error, Debug)]
pub enum QizxError {
    /// Request is unknown or has invalid or missing parameters
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Incident in the server, for example a request on a stopped XML engine
    #[error("Server error: {0}")]
    Server(String),

    /// Attempt to access a non-existent document or collection
    #[error("Not found: {0}")]
    NotFound(String),

    /// Attempt to access forbidden documents or collections
    #[error("Access denied: {0}")]
    AccessControl(String),

    /// Error detected by the XML database engine
    #[error("XML data error: {0}")]
    XmlData(String),

    /// XQuery compile time error
    #[error("XQuery compilation error: {0}")]
    Compilation(String),

    /// XQuery evaluation error
    #[error("XQuery evaluation error: {0}")]
    Evaluation(String),

    /// Evaluation time limit reached
    #[error("Evaluation timed out: {0}")]
    Timeout(String),

    /// Server error of a kind this client does not know
    #[error("Qizx error: {0}")]
    Other(String),

    /// Import of at least some documents failed
    #[error("Import failed: {0}")]
    Import(String),

    /// A batched property transaction was rolled back
    #[error("Transaction rolled back: {0}")]
    Transaction(String),

    /// Response did not have the expected content type or shape
    #[error("Unexpected response from server (content type {content_type:?}): {body}")]
    UnexpectedResponse {
        content_type: Option<String>,
        body: String,
    },

    /// XML response could not be decoded
    #[error("Malformed XML response: {0}")]
    MalformedXml(String),

    /// JSON response could not be decoded
    #[error("Malformed JSON response: {0}")]
    MalformedJson(String),

    /// Caller supplied an argument the server would reject
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Transport-level failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Service URL could not be used
    #[error("Invalid service URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Connection configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QizxError {
    /// Build the error for a `text/x-qizx-error` response body.
    pub fn from_server_message(text: &str) -> Self {
        let text = text.trim().to_string();
        let kind = text.split(':').next().unwrap_or_default().trim();

        match kind {
            "BadRequest" => QizxError::BadRequest(text),
            "Server" => QizxError::Server(text),
            "NotFound" => QizxError::NotFound(text),
            "AccessControl" => QizxError::AccessControl(text),
            "XMLData" => QizxError::XmlData(text),
            "Compilation" => QizxError::Compilation(text),
            "Evaluation" => QizxError::Evaluation(text),
            "TimeOut" => QizxError::Timeout(text),
            _ => QizxError::Other(text),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        QizxError::Config(msg.into())
    }

    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        QizxError::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            QizxError::NotFound(_) => true,
            QizxError::Http(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }

    /// Whether the server could not be reached at all.
    pub fn is_connection_failure(&self) -> bool {
        match self {
            QizxError::Http(e) => e.is_connect() || e.is_builder(),
            QizxError::InvalidUrl { .. } | QizxError::Config(_) => true,
            _ => false,
        }
    }
}

pub(crate) fn malformed(err: impl std::fmt::Display) -> QizxError {
    QizxError::MalformedXml(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message_kinds() {
        assert!(matches!(
            QizxError::from_server_message("NotFound: no such library member: /a"),
            QizxError::NotFound(_)
        ));
        assert!(matches!(
            QizxError::from_server_message("XMLData: bad markup"),
            QizxError::XmlData(_)
        ));
        assert!(matches!(
            QizxError::from_server_message("TimeOut: 10s"),
            QizxError::Timeout(_)
        ));
        assert!(matches!(
            QizxError::from_server_message("Weird: thing"),
            QizxError::Other(_)
        ));
    }

    #[test]
    fn test_not_found_keeps_full_message() {
        let err = QizxError::from_server_message("NotFound: no such library: lib\n");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Not found: NotFound: no such library: lib");
    }
}
