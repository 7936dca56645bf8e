//! Per-user cache of upstream results.
//!
//! One LRU map keyed by username, each user holding at most one entry per
//! [`ResultKind`]. Freshness is decided against the caller's clock so the
//! cache never reads wall time itself.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use lru::LruCache;
use telemon_types::{ResultKind, Timestamp, mask_username};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// A cached value and when it was fetched from the upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<V> {
    pub value: V,
    pub refreshed_at: Timestamp,
}

/// Everything cached for one user.
#[derive(Debug)]
struct UserEntry<V> {
    entries: HashMap<ResultKind, Cached<V>>,
    /// Digest of the credentials behind the last successful login.
    credential: Option<[u8; 32]>,
    /// Updated under the shared lock, hence atomic.
    last_access: AtomicI64,
}

impl<V> UserEntry<V> {
    fn new(now: Timestamp) -> Self {
        Self {
            entries: HashMap::new(),
            credential: None,
            last_access: AtomicI64::new(now),
        }
    }

    fn touch(&self, now: Timestamp) {
        self.last_access.fetch_max(now, Ordering::Relaxed);
    }

    fn last_access(&self) -> Timestamp {
        self.last_access.load(Ordering::Relaxed)
    }
}

fn secs(d: Duration) -> i64 {
    i64::try_from(d.as_secs()).unwrap_or(i64::MAX)
}

/// Per-user result cache with per-kind TTL and an LRU bound on users.
///
/// Reads take the shared lock and use `peek`, so they never reorder the
/// LRU; writes take the exclusive lock. Cloning shares the same storage.
pub struct UserCache<V> {
    inner: Arc<RwLock<LruCache<String, UserEntry<V>>>>,
    config: CacheConfig,
}

impl<V: Clone + Send + Sync> UserCache<V> {
    /// Create a cache. Fails if `max_users` is zero.
    pub fn new(config: CacheConfig) -> Result<Self> {
        let cap = NonZeroUsize::new(config.max_users).ok_or_else(|| {
            CacheError::InvalidConfig("max_users must be greater than zero".to_string())
        })?;
        Ok(Self {
            inner: Arc::new(RwLock::new(LruCache::new(cap))),
            config,
        })
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the value for (`username`, `kind`) only if it is within TTL.
    pub async fn get_if_fresh(
        &self,
        username: &str,
        kind: ResultKind,
        now: Timestamp,
    ) -> Option<V> {
        self.fresh_entry(username, kind, now).await.map(|c| c.value)
    }

    /// Like [`get_if_fresh`](Self::get_if_fresh), keeping the refresh time.
    pub async fn fresh_entry(
        &self,
        username: &str,
        kind: ResultKind,
        now: Timestamp,
    ) -> Option<Cached<V>> {
        let ttl = secs(self.config.ttl_for(kind));
        let inner = self.inner.read().await;
        let user = inner.peek(username)?;
        user.touch(now);

        let cached = user.entries.get(&kind)?;
        if now < cached.refreshed_at.saturating_add(ttl) {
            trace!(username = %mask_username(username), kind = %kind, "Cache hit");
            Some(cached.clone())
        } else {
            trace!(username = %mask_username(username), kind = %kind, "Cache entry stale");
            None
        }
    }

    /// Return the last stored value regardless of age.
    pub async fn last_known(&self, username: &str, kind: ResultKind) -> Option<Cached<V>> {
        let inner = self.inner.read().await;
        inner.peek(username)?.entries.get(&kind).cloned()
    }

    /// Store a value, replacing any previous entry for (`username`, `kind`).
    pub async fn put(&self, username: &str, kind: ResultKind, value: V, now: Timestamp) {
        let mut inner = self.inner.write().await;
        if !inner.contains(username) {
            Self::insert_user(&mut inner, username, now);
        }
        if let Some(user) = inner.get_mut(username) {
            user.touch(now);
            user.entries.insert(
                kind,
                Cached {
                    value,
                    refreshed_at: now,
                },
            );
        }
        trace!(username = %mask_username(username), kind = %kind, "Cache entry stored");
    }

    /// Remember the credential digest of a successful login for `username`.
    pub async fn set_credential(&self, username: &str, digest: [u8; 32], now: Timestamp) {
        let mut inner = self.inner.write().await;
        if !inner.contains(username) {
            Self::insert_user(&mut inner, username, now);
        }
        if let Some(user) = inner.get_mut(username) {
            user.touch(now);
            user.credential = Some(digest);
        }
    }

    /// The credential digest recorded for `username`, if any.
    pub async fn credential(&self, username: &str) -> Option<[u8; 32]> {
        self.inner.read().await.peek(username)?.credential
    }

    /// Make sure a record exists for `username`. Returns `true` if it was created.
    pub async fn ensure_user(&self, username: &str, now: Timestamp) -> bool {
        {
            let inner = self.inner.read().await;
            if let Some(user) = inner.peek(username) {
                user.touch(now);
                return false;
            }
        }

        let mut inner = self.inner.write().await;
        // Another task may have inserted between the two locks.
        if inner.contains(username) {
            return false;
        }
        Self::insert_user(&mut inner, username, now);
        true
    }

    fn insert_user(inner: &mut LruCache<String, UserEntry<V>>, username: &str, now: Timestamp) {
        if let Some((evicted, _)) = inner.push(username.to_string(), UserEntry::new(now))
            && evicted != username
        {
            debug!(username = %mask_username(&evicted), "Evicted least recently used user");
        }
    }

    /// Drop users not accessed within `horizon` of `now`. Returns how many.
    pub async fn evict_idle(&self, now: Timestamp, horizon: Duration) -> usize {
        let cutoff = now.saturating_sub(secs(horizon));
        let mut inner = self.inner.write().await;
        let idle: Vec<String> = inner
            .iter()
            .filter(|(_, user)| user.last_access() < cutoff)
            .map(|(name, _)| name.clone())
            .collect();

        for name in &idle {
            inner.pop(name);
            debug!(username = %mask_username(name), "Evicted idle user");
        }
        idle.len()
    }

    /// Remove everything cached for `username`. Returns `true` if anything was removed.
    pub async fn remove_user(&self, username: &str) -> bool {
        self.inner.write().await.pop(username).is_some()
    }

    /// Whether a record exists for `username`.
    pub async fn contains_user(&self, username: &str) -> bool {
        self.inner.read().await.contains(username)
    }

    /// Number of users with a record.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        CacheStats {
            users: inner.len(),
            entries: inner.iter().map(|(_, user)| user.entries.len()).sum(),
            capacity: self.config.max_users,
        }
    }
}

impl<V> Clone for UserCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: self.config.clone(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Users with a record.
    pub users: usize,

    /// Cached (user, kind) entries.
    pub entries: usize,

    /// Maximum number of users.
    pub capacity: usize,
}
