//! Application state shared across handlers.

use std::sync::Arc;

use telemon_monitor::UsageMonitor;

use crate::config::ServerConfig;
use crate::ratelimit::{SharedRateLimiter, create_rate_limiter};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The usage orchestrator.
    pub monitor: Arc<UsageMonitor>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Global request limiter.
    pub limiter: SharedRateLimiter,
}

impl AppState {
    /// Create a new application state.
    pub fn new(monitor: UsageMonitor, config: ServerConfig) -> Self {
        let limiter = create_rate_limiter(config.api_rpm);
        Self {
            monitor: Arc::new(monitor),
            config: Arc::new(config),
            limiter,
        }
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
