//! Error types for the server.
//!
//! Every error is answered as `{"code": <status>, "msg": "..."}` with the
//! same HTTP status, so clients can read either.

use std::time::Duration;

use axum::{
    Json,
    http::{StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use telemon_monitor::MonitorError;
use thiserror::Error;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Missing or malformed query parameters.
    #[error("{0}")]
    BadRequest(String),

    /// No API key supplied.
    #[error("missing required parameter 'key'")]
    MissingKey,

    /// API key does not match.
    #[error("invalid key")]
    InvalidKey,

    /// Login cooldown in effect and nothing cached.
    #[error("login throttled, retry in {}s", retry_after.as_secs())]
    Throttled { retry_after: Duration },

    /// Global request limit exceeded.
    #[error("rate limit exceeded")]
    RateLimitExceeded { retry_after: Duration },

    /// The upstream provider failed and nothing cached could be served.
    #[error("{0}")]
    Upstream(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::MissingKey => StatusCode::UNAUTHORIZED,
            ServerError::InvalidKey => StatusCode::FORBIDDEN,
            ServerError::Throttled { .. } | ServerError::RateLimitExceeded { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ServerError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ServerError::Throttled { retry_after }
            | ServerError::RateLimitExceeded { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<MonitorError> for ServerError {
    fn from(e: MonitorError) -> Self {
        match e {
            MonitorError::ThrottleDenied { retry_after } => ServerError::Throttled { retry_after },
            MonitorError::UpstreamLoginFailed(_) | MonitorError::UpstreamFetchFailed(_) => {
                ServerError::Upstream(e.to_string())
            }
            MonitorError::InvalidUsername => ServerError::BadRequest(e.to_string()),
            MonitorError::Persistence(_) | MonitorError::Internal(_) => {
                ServerError::Internal(e.to_string())
            }
        }
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Mirrors the HTTP status.
    pub code: u16,
    /// Human-readable error message.
    pub msg: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %msg, "Server error");
        } else {
            tracing::warn!(status = %status, error = %msg, "Client error");
        }

        let body = ErrorResponse {
            code: status.as_u16(),
            msg,
        };

        match self.retry_after() {
            Some(wait) => {
                // Round up so clients never retry a moment too early.
                let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
                (status, [(RETRY_AFTER, secs.to_string())], Json(body)).into_response()
            }
            None => (status, Json(body)).into_response(),
        }
    }
}
