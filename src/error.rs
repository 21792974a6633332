//! Error types for the sp_linker crate.

use thiserror::Error;

/// Errors that can occur when talking to Microsoft Graph.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),
}

impl GraphError {
    /// True for `NotFound` and for an HTTP 404.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GraphError::NotFound(_) | GraphError::Http { status: 404, .. }
        )
    }

    /// The HTTP status carried by an `Http` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            GraphError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for GraphError.
pub type Result<T> = std::result::Result<T, GraphError>;
