//! Test fixtures: an app state over in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use telemon_monitor::{MonitorConfig, UsageMonitor};
use telemon_session::{CacheConfig, UserCache};
use telemon_token::{InMemoryTokenStore, LoginThrottle};
use telemon_types::ManualClock;
use telemon_upstream::MockUpstream;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Build a state backed by a mock upstream and a clock frozen at 1000.
pub(crate) fn test_state(config: ServerConfig) -> (AppState, Arc<MockUpstream>) {
    let upstream = Arc::new(MockUpstream::new());
    let store = Arc::new(InMemoryTokenStore::new());
    let clock = Arc::new(ManualClock::new(1_000));
    let cache = UserCache::new(CacheConfig::new()).unwrap();
    let throttle = LoginThrottle::new(store, Duration::from_secs(600));
    let monitor = UsageMonitor::new(cache, throttle, upstream.clone(), clock)
        .with_config(MonitorConfig::new().with_dev(config.dev));
    (AppState::new(monitor, config), upstream)
}
