//! Error types for usage lookups.

use std::time::Duration;

use telemon_token::TokenError;
use telemon_upstream::UpstreamError;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Why a lookup produced no data.
///
/// None of these are fatal to the process; each concerns one user only.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// A login is not allowed yet and nothing cached could be served.
    #[error("Login throttled, retry in {}s", retry_after.as_secs())]
    ThrottleDenied { retry_after: Duration },

    /// The upstream login failed and nothing cached could be served.
    #[error("Upstream login failed: {0}")]
    UpstreamLoginFailed(#[source] UpstreamError),

    /// The data fetch failed and nothing cached could be served.
    #[error("Upstream fetch failed: {0}")]
    UpstreamFetchFailed(#[source] UpstreamError),

    /// A token record could not be written or removed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] TokenError),

    /// The username cannot be used as a storage key.
    #[error("Invalid username")]
    InvalidUsername,

    /// The refresh task died before producing a result.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MonitorError {
    /// Whether the caller should be told to come back later rather than
    /// that something broke.
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::ThrottleDenied { .. })
    }
}
