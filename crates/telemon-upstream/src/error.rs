//! Error types for the upstream client.

use thiserror::Error;

/// Result type alias using the upstream error type.
pub type Result<T> = std::result::Result<T, UpstreamError>;

/// Errors returned by an [`UpstreamClient`](crate::UpstreamClient).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// Connection failed or the transport broke mid-request.
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete within the configured timeout.
    #[error("Upstream request timed out")]
    Timeout,

    /// The provider answered with a non-success result code.
    #[error("Upstream rejected request ({code}): {msg}")]
    Rejected { code: String, msg: String },

    /// The session token is no longer accepted.
    #[error("Upstream session expired")]
    SessionExpired,

    /// The response could not be decoded.
    #[error("Failed to decode upstream response: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// Create a rejection error.
    pub fn rejected(code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            msg: msg.into(),
        }
    }

    /// Transient failures that a later attempt may not hit.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for UpstreamError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
