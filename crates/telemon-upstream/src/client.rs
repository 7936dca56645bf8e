//! The upstream client trait and its request/response types.

use std::sync::Arc;

use async_trait::async_trait;
use telemon_types::{Credentials, FluxPackage, ImportantData};

use crate::error::Result;

/// Result of a successful login.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginTicket {
    /// Session token to present on subsequent fetches.
    pub token: String,
}

impl std::fmt::Debug for LoginTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginTicket").finish_non_exhaustive()
    }
}

/// An authenticated session used for data fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamSession {
    pub username: String,
    pub token: String,
}

impl UpstreamSession {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }
}

/// Client for the upstream provider.
///
/// Implementations perform exactly one remote call per method and never
/// retry; pacing logins is the caller's job.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Log in and obtain a session token.
    async fn login(&self, credentials: &Credentials) -> Result<LoginTicket>;

    /// Fetch the account overview.
    async fn important_data(&self, session: &UpstreamSession) -> Result<ImportantData>;

    /// Fetch the flow package breakdown.
    async fn flux_package(&self, session: &UpstreamSession) -> Result<FluxPackage>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "upstream"
    }
}

/// Shared upstream client for use across async contexts.
pub type SharedUpstream = Arc<dyn UpstreamClient>;
