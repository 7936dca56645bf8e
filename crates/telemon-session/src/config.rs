//! Configuration for the user cache.

use std::collections::HashMap;
use std::time::Duration;

use telemon_types::{HasCacheConfig, ResultKind, config_defaults};

/// Configuration for the user cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for kinds without an override.
    pub default_ttl: Duration,

    /// Per-kind TTL overrides.
    pub kind_ttls: HashMap<ResultKind, Duration>,

    /// Maximum number of users held before LRU eviction.
    pub max_users: usize,

    /// Users not accessed for this long are dropped by the sweep.
    pub idle_horizon: Duration,

    /// How often the maintenance sweep runs.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: config_defaults::cache_ttl(),
            kind_ttls: HashMap::new(),
            max_users: config_defaults::MAX_USERS,
            idle_horizon: config_defaults::idle_horizon(),
            sweep_interval: config_defaults::sweep_interval(),
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from any cache configuration provider.
    pub fn from_config<C: HasCacheConfig>(config: &C) -> Self {
        Self {
            default_ttl: config.cache_ttl(),
            kind_ttls: config.kind_ttls(),
            max_users: config.max_users(),
            idle_horizon: config.idle_horizon(),
            sweep_interval: config.sweep_interval(),
        }
    }

    /// Set the TTL used for every kind without an override.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Override the TTL for one kind.
    pub fn with_kind_ttl(mut self, kind: ResultKind, ttl: Duration) -> Self {
        self.kind_ttls.insert(kind, ttl);
        self
    }

    pub fn with_max_users(mut self, max: usize) -> Self {
        self.max_users = max;
        self
    }

    pub fn with_idle_horizon(mut self, horizon: Duration) -> Self {
        self.idle_horizon = horizon;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// TTL that applies to `kind`.
    pub fn ttl_for(&self, kind: ResultKind) -> Duration {
        self.kind_ttls
            .get(&kind)
            .copied()
            .unwrap_or(self.default_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemon_types::CacheConfigProvider;

    #[test]
    fn test_ttl_for_falls_back_to_default() {
        let config = CacheConfig::new()
            .with_ttl(Duration::from_secs(180))
            .with_kind_ttl(ResultKind::FluxPackage, Duration::from_secs(900));

        assert_eq!(config.ttl_for(ResultKind::Summary), Duration::from_secs(180));
        assert_eq!(config.ttl_for(ResultKind::Detail), Duration::from_secs(180));
        assert_eq!(
            config.ttl_for(ResultKind::FluxPackage),
            Duration::from_secs(900)
        );
    }

    #[test]
    fn test_from_provider() {
        let provider = CacheConfigProvider {
            cache_ttl: Duration::from_secs(60),
            max_users: 5,
            ..Default::default()
        };
        let config = CacheConfig::from_config(&provider);
        assert_eq!(config.default_ttl, Duration::from_secs(60));
        assert_eq!(config.max_users, 5);
    }
}
