//! Per-user login cooldown.
//!
//! A login may be attempted when no login is on record, or when at least
//! `login_interval` has passed since the recorded one. The recorded time
//! lives in the token store; the throttle only reads and stamps it.

use std::time::Duration;

use telemon_types::{HasThrottleConfig, Timestamp, mask_username};

use crate::error::Result;
use crate::store::SharedTokenStore;

/// Remaining cooldown given the last login time, or `None` if a login is allowed.
fn cooldown_remaining(
    last_login: Option<Timestamp>,
    now: Timestamp,
    interval: Duration,
) -> Option<Duration> {
    let last = last_login?;
    let elapsed = now.saturating_sub(last).max(0);
    let interval_secs = i64::try_from(interval.as_secs()).unwrap_or(i64::MAX);
    if elapsed >= interval_secs {
        None
    } else {
        Some(Duration::from_secs((interval_secs - elapsed) as u64))
    }
}

/// Login throttle backed by a token store.
#[derive(Debug, Clone)]
pub struct LoginThrottle {
    store: SharedTokenStore,
    interval: Duration,
}

impl LoginThrottle {
    pub fn new(store: SharedTokenStore, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Create a throttle from a configuration provider.
    pub fn from_config<C: HasThrottleConfig>(store: SharedTokenStore, config: &C) -> Self {
        Self::new(store, config.login_interval())
    }

    /// Configured minimum interval between logins.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The underlying token store.
    pub fn store(&self) -> &SharedTokenStore {
        &self.store
    }

    /// Whether a new login may be attempted for `username` at `now`.
    pub async fn can_attempt_login(&self, username: &str, now: Timestamp) -> bool {
        self.retry_after(username, now).await.is_none()
    }

    /// Time left before a login is allowed, or `None` if allowed now.
    pub async fn retry_after(&self, username: &str, now: Timestamp) -> Option<Duration> {
        let last = self.store.get(username).await.map(|s| s.login_last_time);
        cooldown_remaining(last, now, self.interval)
    }

    /// Record a successful login and its token.
    pub async fn record_success(&self, username: &str, token: &str, now: Timestamp) -> Result<()> {
        self.store.set(username, token, now).await
    }

    /// Stamp a login attempt, keeping any previous token.
    ///
    /// Called before the upstream login so a failed attempt still consumes
    /// the cooldown.
    pub async fn record_attempt(&self, username: &str, now: Timestamp) -> Result<()> {
        let token = self
            .store
            .get(username)
            .await
            .map(|s| s.token)
            .unwrap_or_default();
        self.store.set(username, &token, now).await
    }

    /// Blank the persisted token, keeping the login time.
    pub async fn invalidate(&self, username: &str) -> Result<()> {
        if let Some(session) = self.store.get(username).await {
            tracing::info!(username = %mask_username(username), "Invalidating session token");
            self.store.set(username, "", session.login_last_time).await?;
        }
        Ok(())
    }
}
