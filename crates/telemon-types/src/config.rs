//! Configuration traits for decoupled config passing between crates.
//!
//! The cache and the login throttle only need a handful of knobs each.
//! These traits let them take "anything that can answer these questions"
//! instead of depending on the full `telemon-config` structure.

use std::collections::HashMap;
use std::time::Duration;

use crate::kind::ResultKind;

/// Base trait for all configuration types.
pub trait ConfigProvider: Clone + Send + Sync + 'static {}

/// User cache configuration.
pub trait HasCacheConfig: ConfigProvider {
    /// Default TTL for a cached result (`intervalsTime`).
    fn cache_ttl(&self) -> Duration;

    /// Per-kind TTL overrides. Kinds not listed use [`cache_ttl`](Self::cache_ttl).
    fn kind_ttls(&self) -> HashMap<ResultKind, Duration> {
        HashMap::new()
    }

    /// Maximum number of users kept in memory before LRU eviction.
    fn max_users(&self) -> usize;

    /// Users idle for longer than this are dropped by the maintenance sweep.
    fn idle_horizon(&self) -> Duration;

    /// How often the maintenance sweep runs.
    fn sweep_interval(&self) -> Duration;
}

/// Login throttle configuration.
pub trait HasThrottleConfig: ConfigProvider {
    /// Minimum time between two login attempts for one user (`loginIntervalTime`).
    fn login_interval(&self) -> Duration;
}

/// Default configuration values.
pub mod defaults {
    use std::time::Duration;

    pub const LOGIN_INTERVAL_SECS: u64 = 600;
    pub const CACHE_TTL_SECS: u64 = 180;
    pub const UPSTREAM_TIMEOUT_SECS: u64 = 30;
    pub const MAX_USERS: usize = 10_000;
    pub const IDLE_HORIZON_SECS: u64 = 24 * 60 * 60;
    pub const SWEEP_INTERVAL_SECS: u64 = 600;
    pub const REQUESTS_PER_MINUTE: u32 = 120;
    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_BIND: &str = "0.0.0.0";
    pub const DEFAULT_DATA_PATH: &str = "data";

    pub fn login_interval() -> Duration {
        Duration::from_secs(LOGIN_INTERVAL_SECS)
    }

    pub fn cache_ttl() -> Duration {
        Duration::from_secs(CACHE_TTL_SECS)
    }

    pub fn upstream_timeout() -> Duration {
        Duration::from_secs(UPSTREAM_TIMEOUT_SECS)
    }

    pub fn idle_horizon() -> Duration {
        Duration::from_secs(IDLE_HORIZON_SECS)
    }

    pub fn sweep_interval() -> Duration {
        Duration::from_secs(SWEEP_INTERVAL_SECS)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Standalone providers
// ─────────────────────────────────────────────────────────────────────────────

/// Standalone cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfigProvider {
    pub cache_ttl: Duration,
    pub kind_ttls: HashMap<ResultKind, Duration>,
    pub max_users: usize,
    pub idle_horizon: Duration,
    pub sweep_interval: Duration,
}

impl Default for CacheConfigProvider {
    fn default() -> Self {
        Self {
            cache_ttl: defaults::cache_ttl(),
            kind_ttls: HashMap::new(),
            max_users: defaults::MAX_USERS,
            idle_horizon: defaults::idle_horizon(),
            sweep_interval: defaults::sweep_interval(),
        }
    }
}

impl ConfigProvider for CacheConfigProvider {}

impl HasCacheConfig for CacheConfigProvider {
    fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    fn kind_ttls(&self) -> HashMap<ResultKind, Duration> {
        self.kind_ttls.clone()
    }

    fn max_users(&self) -> usize {
        self.max_users
    }

    fn idle_horizon(&self) -> Duration {
        self.idle_horizon
    }

    fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }
}

/// Standalone throttle configuration.
#[derive(Debug, Clone)]
pub struct ThrottleConfigProvider {
    pub login_interval: Duration,
}

impl Default for ThrottleConfigProvider {
    fn default() -> Self {
        Self {
            login_interval: defaults::login_interval(),
        }
    }
}

impl ConfigProvider for ThrottleConfigProvider {}

impl HasThrottleConfig for ThrottleConfigProvider {
    fn login_interval(&self) -> Duration {
        self.login_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_provider_defaults() {
        let config = CacheConfigProvider::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(180));
        assert_eq!(config.max_users(), 10_000);
        assert!(config.kind_ttls().is_empty());
    }

    #[test]
    fn test_throttle_provider_defaults() {
        let config = ThrottleConfigProvider::default();
        assert_eq!(config.login_interval(), Duration::from_secs(600));
    }
}
