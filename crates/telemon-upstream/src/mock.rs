//! Scripted upstream for tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use telemon_types::{
    Credentials, FlowCategory, FlowItem, FluxPackage, ImportantData, PackageProduct,
    ResourcePackage,
};

use crate::client::{LoginTicket, UpstreamClient, UpstreamSession};
use crate::error::{Result, UpstreamError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A canned overview with `used_mb` of common flow used.
pub fn sample_important_data(username: &str, used_mb: i64) -> ImportantData {
    ImportantData {
        phonenum: username.to_string(),
        balance: 1000,
        voice_usage: 10,
        voice_total: 100,
        flow_items: vec![FlowItem {
            name: "Domestic".to_string(),
            category: FlowCategory::Common,
            used: used_mb * 1024,
            total: 10 * 1024 * 1024,
        }],
    }
}

/// A canned flow package.
pub fn sample_flux_package() -> FluxPackage {
    FluxPackage {
        packages: vec![ResourcePackage {
            title: "Domestic general flow".to_string(),
            products: vec![PackageProduct {
                title: "Monthly plan".to_string(),
                used: "500.00MB".to_string(),
                total: Some("10.00GB".to_string()),
            }],
        }],
    }
}

/// In-process upstream with call counters and scriptable failures.
///
/// Logins issue tokens `tok-1`, `tok-2`, ... and fetches succeed only with
/// a token this mock issued (or one registered with [`accept_token`]).
///
/// [`accept_token`]: MockUpstream::accept_token
#[derive(Default)]
pub struct MockUpstream {
    logins: AtomicUsize,
    fetches: AtomicUsize,
    login_log: Mutex<Vec<String>>,
    login_failures: Mutex<VecDeque<UpstreamError>>,
    fetch_failures: Mutex<VecDeque<UpstreamError>>,
    tokens: Mutex<HashSet<String>>,
    data: Mutex<HashMap<String, ImportantData>>,
    flux: Mutex<Option<FluxPackage>>,
    delay: Mutex<Option<Duration>>,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `data` for its `phonenum`.
    pub fn with_important_data(self, data: ImportantData) -> Self {
        self.set_important_data(data);
        self
    }

    /// Delay every call by `delay`.
    pub fn with_delay(self, delay: Duration) -> Self {
        *lock(&self.delay) = Some(delay);
        self
    }

    /// Replace the overview served for `data.phonenum`.
    pub fn set_important_data(&self, data: ImportantData) {
        lock(&self.data).insert(data.phonenum.clone(), data);
    }

    pub fn set_flux_package(&self, package: FluxPackage) {
        *lock(&self.flux) = Some(package);
    }

    /// Make the next login fail with `error`.
    pub fn fail_next_login(&self, error: UpstreamError) {
        lock(&self.login_failures).push_back(error);
    }

    /// Make the next fetch fail with `error`.
    pub fn fail_next_fetch(&self, error: UpstreamError) {
        lock(&self.fetch_failures).push_back(error);
    }

    /// Treat `token` as valid, e.g. one persisted by an earlier process.
    pub fn accept_token(&self, token: impl Into<String>) {
        lock(&self.tokens).insert(token.into());
    }

    /// Expire every issued token.
    pub fn expire_sessions(&self) {
        lock(&self.tokens).clear();
    }

    /// Number of login calls.
    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    /// Number of data fetch calls.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Total calls of any kind.
    pub fn call_count(&self) -> usize {
        self.login_count() + self.fetch_count()
    }

    /// Usernames passed to `login`, in order.
    pub fn logins(&self) -> Vec<String> {
        lock(&self.login_log).clone()
    }

    async fn pause(&self) {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_fetch(&self, session: &UpstreamSession) -> Result<()> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = lock(&self.fetch_failures).pop_front() {
            return Err(error);
        }
        if !lock(&self.tokens).contains(&session.token) {
            return Err(UpstreamError::SessionExpired);
        }
        Ok(())
    }
}

#[async_trait]
impl UpstreamClient for MockUpstream {
    async fn login(&self, credentials: &Credentials) -> Result<LoginTicket> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.login_log).push(credentials.username.clone());
        self.pause().await;

        if let Some(error) = lock(&self.login_failures).pop_front() {
            return Err(error);
        }
        let token = format!("tok-{n}");
        lock(&self.tokens).insert(token.clone());
        Ok(LoginTicket { token })
    }

    async fn important_data(&self, session: &UpstreamSession) -> Result<ImportantData> {
        self.pause().await;
        self.check_fetch(session)?;
        let data = lock(&self.data)
            .get(&session.username)
            .cloned()
            .unwrap_or_else(|| sample_important_data(&session.username, 500));
        Ok(data)
    }

    async fn flux_package(&self, session: &UpstreamSession) -> Result<FluxPackage> {
        self.pause().await;
        self.check_fetch(session)?;
        Ok(lock(&self.flux).clone().unwrap_or_else(sample_flux_package))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
