//! Error types for report generation

use thiserror::Error;

/// Failures that abort a report request
#[derive(Debug, Error)]
pub enum ReportError {
    /// No domain/access token pair was supplied
    #[error("Missing credentials: a portal domain and access token are required")]
    AuthenticationMissing,

    /// Bitrix24 answered with an error envelope
    #[error("Bitrix24 API error {code}: {description}")]
    RemoteApi { code: String, description: String },

    /// Network failure, non-success status, or unreadable response body
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ReportError {
    fn from(err: reqwest::Error) -> Self {
        ReportError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
