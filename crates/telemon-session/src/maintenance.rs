//! Background sweep that keeps the cache bounded between requests.
//!
//! The sweep only drops data. It never refreshes anything, so it never
//! touches the upstream provider or the token store.

use std::sync::Arc;
use std::time::Duration;

use telemon_types::SharedClock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::UserCache;
use crate::error::{CacheError, Result};

/// Extra work to run after each sweep, e.g. pruning per-user locks.
pub trait SweepHook: Send + Sync {
    /// Returns the number of items released.
    fn after_sweep(&self) -> usize;
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted_users: usize,
    pub released: usize,
}

/// Run one sweep against `cache`.
pub async fn sweep_once<V: Clone + Send + Sync>(
    cache: &UserCache<V>,
    clock: &SharedClock,
    horizon: Duration,
    hook: Option<&dyn SweepHook>,
) -> SweepReport {
    let evicted_users = cache.evict_idle(clock.now(), horizon).await;
    let released = hook.map(|h| h.after_sweep()).unwrap_or(0);
    SweepReport {
        evicted_users,
        released,
    }
}

/// Handle to the spawned maintenance loop.
pub struct MaintenanceTask {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl MaintenanceTask {
    /// Spawn the sweep loop. It runs every `interval` until `cancel` fires.
    pub fn spawn<V: Clone + Send + Sync + 'static>(
        cache: UserCache<V>,
        clock: SharedClock,
        hook: Option<Arc<dyn SweepHook>>,
        cancel: CancellationToken,
    ) -> Self {
        let interval = cache.config().sweep_interval;
        let horizon = cache.config().idle_horizon;
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; skip it so the first
            // sweep happens one interval after start.
            ticker.tick().await;
            info!(interval_secs = interval.as_secs(), "Cache maintenance started");

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Cache maintenance cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let report = sweep_once(&cache, &clock, horizon, hook.as_deref()).await;
                        if report.evicted_users > 0 || report.released > 0 {
                            let cached_users = cache.len().await;
                            info!(
                                evicted_users = report.evicted_users,
                                released = report.released,
                                cached_users,
                                "Cache sweep finished"
                            );
                        }
                    }
                }
            }
        });

        Self { handle, cancel }
    }

    /// Token that stops the loop when cancelled.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        self.handle
            .await
            .map_err(|e| CacheError::Maintenance(e.to_string()))
    }
}
