//! Error types for the Tableau MCP implementation.
//!
//! This module contains the custom error types and conversions needed for the Tableau REST API.
//! It provides:
//! - `TableauError`: The main error enum that covers all possible error cases
//! - Conversions from various error types (`reqwest`, `serde_json`, `zip`, etc.)
//! - Conversion to RMCP's `ErrorData` for MCP protocol compliance

use rmcp::ErrorData;
use rmcp::model::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableauError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Not authenticated with Tableau Server: {0}")]
    NotAuthenticated(String),

    #[error("Tableau Server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP middleware error: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl TableauError {
    /// Rejects an empty (or whitespace-only) required argument.
    pub fn require<'a>(field: &str, value: &'a str) -> Result<&'a str, Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(Self::InvalidParams(format!("{field} cannot be empty.")));
        }
        Ok(trimmed)
    }
}

impl From<TableauError> for ErrorData {
    fn from(err: TableauError) -> Self {
        match err {
            TableauError::InvalidParams(msg) => Self::new(ErrorCode::INVALID_PARAMS, msg, None),
            TableauError::MissingConfig(msg) | TableauError::NotAuthenticated(msg) => {
                Self::new(ErrorCode::INTERNAL_ERROR, msg, None)
            }
            TableauError::Api { status, message } => Self::new(
                ErrorCode::INTERNAL_ERROR,
                format!("Tableau Server returned {status}: {message}"),
                None,
            ),
            TableauError::Http(e) => Self::new(ErrorCode::INTERNAL_ERROR, format!("HTTP error: {e}"), None),
            TableauError::HttpMiddleware(e) => {
                Self::new(ErrorCode::INTERNAL_ERROR, format!("HTTP middleware error: {e}"), None)
            }
            TableauError::Serialization(e) => Self::new(ErrorCode::INTERNAL_ERROR, e.to_string(), None),
            TableauError::Csv(e) => Self::new(ErrorCode::INTERNAL_ERROR, e.to_string(), None),
            TableauError::Io(e) => Self::new(ErrorCode::INTERNAL_ERROR, e.to_string(), None),
            TableauError::Archive(e) => Self::new(ErrorCode::INTERNAL_ERROR, e.to_string(), None),
            TableauError::Internal(e) => Self::new(ErrorCode::INTERNAL_ERROR, e.to_string(), None),
        }
    }
}
