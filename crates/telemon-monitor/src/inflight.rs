//! Per-user refresh serialization.
//!
//! Each username maps to an async mutex. Whoever holds it is the only task
//! allowed to log in, fetch, or write the token record for that user.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use telemon_session::SweepHook;
use tokio::sync::OwnedMutexGuard;

type Marker = Arc<tokio::sync::Mutex<()>>;

/// Registry of per-user in-flight markers.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    markers: Mutex<HashMap<String, Marker>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn markers(&self) -> MutexGuard<'_, HashMap<String, Marker>> {
        self.markers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until no other refresh for `username` is running, then claim it.
    ///
    /// The guard is owned so it can move into a spawned task.
    pub async fn acquire(&self, username: &str) -> OwnedMutexGuard<()> {
        let marker = self
            .markers()
            .entry(username.to_string())
            .or_default()
            .clone();
        marker.lock_owned().await
    }

    /// Whether a refresh for `username` currently holds its marker.
    pub fn is_busy(&self, username: &str) -> bool {
        self.markers()
            .get(username)
            .is_some_and(|m| m.try_lock().is_err())
    }

    /// Number of users whose refresh currently holds its marker.
    pub fn busy_count(&self) -> usize {
        self.markers()
            .values()
            .filter(|m| m.try_lock().is_err())
            .count()
    }

    /// Drop markers nobody holds or waits on. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let mut markers = self.markers();
        let before = markers.len();
        markers.retain(|_, marker| Arc::strong_count(marker) > 1);
        before - markers.len()
    }

    pub fn len(&self) -> usize {
        self.markers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers().is_empty()
    }
}

impl SweepHook for InFlightRegistry {
    fn after_sweep(&self) -> usize {
        self.prune()
    }
}
