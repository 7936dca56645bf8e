//! The usage orchestrator.
//!
//! A lookup is served from the cache while it is fresh. Once stale, one
//! task per user refreshes it: log in if the throttle allows (otherwise
//! reuse the persisted token), fetch, persist, cache. Any failure falls
//! back to the last cached value when there is one.
//!
//! Cached values, the stale fallback and the persisted token are only
//! used for a request whose credentials match those of the last
//! successful login. Any other request has to log in, and so goes
//! through the throttle.

use std::sync::Arc;

use telemon_session::{CacheStats, Cached, UserCache};
use telemon_token::{LoginThrottle, validate_username};
use telemon_types::{
    Credentials, ResultKind, SharedClock, Summary, Timestamp, UsageData, mask_username,
};
use telemon_upstream::{SharedUpstream, UpstreamError, UpstreamSession};
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::credential::CredentialDigester;
use crate::error::{MonitorError, Result};
use crate::inflight::InFlightRegistry;

/// Outcome of a lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub data: UsageData,
    /// The value is older than its TTL and was served because a refresh failed.
    pub stale: bool,
    /// When the value was fetched from the upstream.
    pub refreshed_at: Timestamp,
}

impl Lookup {
    fn fresh(cached: Cached<UsageData>) -> Self {
        Self {
            data: cached.value,
            stale: false,
            refreshed_at: cached.refreshed_at,
        }
    }

    fn stale(cached: Cached<UsageData>) -> Self {
        Self {
            data: cached.value,
            stale: true,
            refreshed_at: cached.refreshed_at,
        }
    }
}

/// Serves usage data per user, refreshing from the upstream when stale.
///
/// Cloning is cheap; clones share the cache, throttle and in-flight state.
#[derive(Clone)]
pub struct UsageMonitor {
    cache: UserCache<UsageData>,
    throttle: LoginThrottle,
    upstream: SharedUpstream,
    clock: SharedClock,
    inflight: Arc<InFlightRegistry>,
    digester: CredentialDigester,
    config: MonitorConfig,
}

impl UsageMonitor {
    pub fn new(
        cache: UserCache<UsageData>,
        throttle: LoginThrottle,
        upstream: SharedUpstream,
        clock: SharedClock,
    ) -> Self {
        Self {
            cache,
            throttle,
            upstream,
            clock,
            inflight: Arc::new(InFlightRegistry::new()),
            digester: CredentialDigester::new(),
            config: MonitorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn cache(&self) -> &UserCache<UsageData> {
        &self.cache
    }

    pub fn throttle(&self) -> &LoginThrottle {
        &self.throttle
    }

    pub fn upstream(&self) -> &SharedUpstream {
        &self.upstream
    }

    /// In-flight markers, for pruning from the maintenance sweep.
    pub fn inflight(&self) -> Arc<InFlightRegistry> {
        Arc::clone(&self.inflight)
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub async fn summary(&self, credentials: &Credentials) -> Result<Lookup> {
        self.lookup(credentials, ResultKind::Summary).await
    }

    pub async fn important_data(&self, credentials: &Credentials) -> Result<Lookup> {
        self.lookup(credentials, ResultKind::Detail).await
    }

    pub async fn flux_package(&self, credentials: &Credentials) -> Result<Lookup> {
        self.lookup(credentials, ResultKind::FluxPackage).await
    }

    /// Return `kind` for the user, refreshing it if stale.
    pub async fn lookup(&self, credentials: &Credentials, kind: ResultKind) -> Result<Lookup> {
        let username = validate_username(&credentials.username)
            .map_err(|_| MonitorError::InvalidUsername)?;
        let now = self.clock.now();

        self.cache.ensure_user(username, now).await;
        if self.verified(credentials).await
            && let Some(cached) = self.cache.fresh_entry(username, kind, now).await
        {
            return Ok(Lookup::fresh(cached));
        }

        // The refresh owns the in-flight guard inside its own task, so a
        // caller that goes away does not abort a login halfway through.
        let monitor = self.clone();
        let credentials = credentials.clone();
        tokio::spawn(async move { monitor.refresh_exclusive(credentials, kind).await })
            .await
            .map_err(|e| MonitorError::Internal(format!("refresh task failed: {e}")))?
    }

    /// Forget the user's session: drop cached data and blank the persisted
    /// token. The last login time stays, so the next login still waits out
    /// the cooldown.
    pub async fn logout(&self, username: &str) -> Result<()> {
        let username = validate_username(username).map_err(|_| MonitorError::InvalidUsername)?;
        let _guard = self.inflight.acquire(username).await;
        self.cache.remove_user(username).await;
        self.throttle.invalidate(username).await?;
        info!(username = %self.display(username), "User logged out");
        Ok(())
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Whether `credentials` are those of the user's last successful login.
    async fn verified(&self, credentials: &Credentials) -> bool {
        match self.cache.credential(&credentials.username).await {
            Some(recorded) => self.digester.matches(credentials, &recorded),
            None => false,
        }
    }

    fn display(&self, username: &str) -> String {
        if self.config.dev {
            username.to_string()
        } else {
            mask_username(username)
        }
    }

    async fn refresh_exclusive(
        &self,
        credentials: Credentials,
        kind: ResultKind,
    ) -> Result<Lookup> {
        let username = credentials.username.as_str();
        let _guard = self.inflight.acquire(username).await;

        // Whoever held the marker before us may have refreshed already.
        let now = self.clock.now();
        let verified = self.verified(&credentials).await;
        if verified && let Some(cached) = self.cache.fresh_entry(username, kind, now).await {
            debug!(username = %self.display(username), kind = %kind, "Refreshed by concurrent request");
            return Ok(Lookup::fresh(cached));
        }

        let err = match self.refresh(&credentials, kind, now, verified).await {
            Ok(data) => {
                return Ok(Lookup {
                    data,
                    stale: false,
                    refreshed_at: now,
                });
            }
            Err(err) => err,
        };

        // A login during the refresh may have just verified the caller.
        if verified || self.verified(&credentials).await {
            self.fall_back(username, kind, err).await
        } else {
            info!(username = %self.display(username), kind = %kind, error = %err, "Unverified request refused");
            Err(err)
        }
    }

    async fn fall_back(
        &self,
        username: &str,
        kind: ResultKind,
        err: MonitorError,
    ) -> Result<Lookup> {
        match self.cache.last_known(username, kind).await {
            Some(cached) => {
                warn!(
                    username = %self.display(username),
                    kind = %kind,
                    error = %err,
                    refreshed_at = cached.refreshed_at,
                    "Refresh failed, serving stale value"
                );
                Ok(Lookup::stale(cached))
            }
            None if err.is_throttled() => {
                info!(username = %self.display(username), kind = %kind, error = %err, "Nothing cached to serve");
                Err(err)
            }
            None => {
                warn!(username = %self.display(username), kind = %kind, error = %err, "Refresh failed");
                Err(err)
            }
        }
    }

    /// Get a usable session and fetch `kind`, writing the cache on success.
    ///
    /// The persisted token is only reused for a `verified` caller.
    async fn refresh(
        &self,
        credentials: &Credentials,
        kind: ResultKind,
        now: Timestamp,
        verified: bool,
    ) -> Result<UsageData> {
        let username = credentials.username.as_str();

        if let Some(retry_after) = self.throttle.retry_after(username, now).await {
            info!(
                username = %self.display(username),
                retry_after_secs = retry_after.as_secs(),
                "Login throttled"
            );
            let persisted = if verified {
                self.throttle
                    .store()
                    .get(username)
                    .await
                    .filter(|s| s.has_token())
            } else {
                None
            };
            if let Some(persisted) = persisted {
                let session = UpstreamSession::new(username, persisted.token);
                match self.fetch(&session, kind, now).await {
                    Ok(data) => return Ok(data),
                    Err(err) => {
                        debug!(username = %self.display(username), error = %err, "Persisted token unusable");
                    }
                }
            }
            return Err(MonitorError::ThrottleDenied { retry_after });
        }

        // The attempt counts against the cooldown whatever the outcome.
        if let Err(e) = self.throttle.record_attempt(username, now).await {
            warn!(username = %self.display(username), error = %e, "Failed to record login attempt");
        }

        let ticket = self
            .upstream
            .login(credentials)
            .await
            .map_err(MonitorError::UpstreamLoginFailed)?;
        info!(username = %self.display(username), "Logged in to upstream");
        self.cache
            .set_credential(username, self.digester.digest(credentials), now)
            .await;

        if let Err(e) = self.throttle.record_success(username, &ticket.token, now).await {
            warn!(username = %self.display(username), error = %e, "Failed to persist session token");
        }

        let session = UpstreamSession::new(username, ticket.token);
        self.fetch(&session, kind, now).await
    }

    /// Fetch with `session` and cache everything the call produced.
    async fn fetch(
        &self,
        session: &UpstreamSession,
        kind: ResultKind,
        now: Timestamp,
    ) -> Result<UsageData> {
        let username = session.username.as_str();
        let fetched = match self.fetch_upstream(session, kind, now).await {
            Ok(fetched) => fetched,
            Err(err) => {
                if err == UpstreamError::SessionExpired
                    && let Err(e) = self.throttle.invalidate(username).await
                {
                    warn!(username = %self.display(username), error = %e, "Failed to invalidate token");
                }
                return Err(MonitorError::UpstreamFetchFailed(err));
            }
        };

        let mut requested = None;
        for data in fetched {
            if data.kind() == kind {
                requested = Some(data.clone());
            }
            self.cache.put(username, data.kind(), data, now).await;
        }
        debug!(username = %self.display(username), kind = %kind, "Cache refreshed");

        requested.ok_or_else(|| MonitorError::Internal(format!("upstream call produced no {kind}")))
    }

    /// One upstream call. The summary is derived from the detail payload,
    /// so either of them yields both.
    async fn fetch_upstream(
        &self,
        session: &UpstreamSession,
        kind: ResultKind,
        now: Timestamp,
    ) -> std::result::Result<Vec<UsageData>, UpstreamError> {
        if kind.from_important_data() {
            let detail = self.upstream.important_data(session).await?;
            let summary = Summary::from_important_data(&session.username, &detail, now);
            Ok(vec![UsageData::Summary(summary), UsageData::Detail(detail)])
        } else {
            let package = self.upstream.flux_package(session).await?;
            Ok(vec![UsageData::FluxPackage(package)])
        }
    }
}
