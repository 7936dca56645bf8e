//! Liveness and occupancy report.
//!
//! `/health` needs no key. It never touches the upstream, so it stays cheap
//! while refreshes are stuck behind a slow login.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Body of `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Which upstream client is configured (`http` or `mock`).
    pub upstream: String,
    /// Users with a cache record.
    pub cached_users: usize,
    /// Users with a refresh in progress.
    pub refreshing: usize,
    pub login_interval_secs: u64,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let monitor = &state.monitor;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        upstream: monitor.upstream().name().to_string(),
        cached_users: monitor.cache_stats().await.users,
        refreshing: monitor.inflight().busy_count(),
        login_interval_secs: monitor.throttle().interval().as_secs(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
