//! Error types for the update system.

use thiserror::Error;

/// Errors that can occur during update operations.
///
/// Terminal download results (integrity failure, transport failure,
/// cancellation) are reported as [`crate::DownloadOutcome`] values; this type
/// covers failures to produce a manifest or to set up an attempt.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Manifest document is not a valid update document
    #[error("manifest parse error: {0}")]
    ManifestParse(String),

    /// Manifest document exceeds the configured size limit
    #[error("manifest exceeds {limit} bytes")]
    ManifestTooLarge { limit: u64 },

    /// A required manifest field is absent or empty
    #[error("manifest field `{field}` is missing for {context}")]
    MissingField { field: &'static str, context: String },

    /// A manifest field is present but unusable
    #[error("manifest field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Content digest does not match the expected value
    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    /// Request completed with a non-success HTTP status
    #[error("download failed with status {status}")]
    DownloadFailed { status: u16 },

    /// Network error while streaming a response body
    #[error("network error: {0}")]
    NetworkError(String),

    /// Transfer was cancelled before it completed
    #[error("transfer cancelled")]
    Cancelled,

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Version parsing error
    #[error("version parse error: {0}")]
    VersionParseError(String),

    /// Background task failed to run to completion
    #[error("background task failed: {0}")]
    TaskFailed(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    HttpError(String),
}

impl From<reqwest::Error> for UpdateError {
    fn from(err: reqwest::Error) -> Self {
        UpdateError::HttpError(err.to_string())
    }
}

impl From<semver::Error> for UpdateError {
    fn from(err: semver::Error) -> Self {
        UpdateError::VersionParseError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for UpdateError {
    fn from(err: tokio::task::JoinError) -> Self {
        UpdateError::TaskFailed(err.to_string())
    }
}
