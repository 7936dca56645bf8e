//! Usage query endpoints.
//!
//! All of them take `username` and `password` as query parameters. Only
//! `/show/flow` is mounted in production; the raw upstream views, logout
//! and cache statistics are dev-only.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use telemon_monitor::Lookup;
use telemon_types::{Credentials, UsageData, mask_username};

use crate::error::{Result, ServerError};
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response Types
// ─────────────────────────────────────────────────────────────────────────────

/// Query parameters shared by the usage endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowQuery {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl FlowQuery {
    /// Both fields present and non-empty.
    fn credentials(self) -> Result<Credentials> {
        match (self.username, self.password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Ok(Credentials::new(u, p)),
            _ => Err(ServerError::BadRequest(
                "missing required parameters 'username' and 'password'".to_string(),
            )),
        }
    }

    fn username(self) -> Result<String> {
        self.username
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ServerError::BadRequest("missing required parameter 'username'".to_string()))
    }
}

/// Successful usage response.
#[derive(Debug, Serialize, Deserialize)]
pub struct FlowResponse {
    pub code: u16,
    pub data: serde_json::Value,
    /// Set when the refresh failed and an older value was served.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
}

/// Logout acknowledgement.
#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub code: u16,
    pub msg: String,
}

/// Cache statistics.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub users: usize,
    pub entries: usize,
    pub capacity: usize,
    pub inflight: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /show/flow - account summary.
pub async fn flow_handler(
    State(state): State<AppState>,
    Query(query): Query<FlowQuery>,
) -> Result<Json<FlowResponse>> {
    let credentials = query.credentials()?;
    let lookup = state.monitor.summary(&credentials).await?;
    respond(&state, lookup)
}

/// GET /show/qryImportantData - raw upstream overview (dev only).
pub async fn qry_important_data_handler(
    State(state): State<AppState>,
    Query(query): Query<FlowQuery>,
) -> Result<Json<FlowResponse>> {
    let credentials = query.credentials()?;
    let lookup = state.monitor.important_data(&credentials).await?;
    respond(&state, lookup)
}

/// GET /show/userFluxPackage - raw flow package breakdown (dev only).
pub async fn user_flux_package_handler(
    State(state): State<AppState>,
    Query(query): Query<FlowQuery>,
) -> Result<Json<FlowResponse>> {
    let credentials = query.credentials()?;
    let lookup = state.monitor.flux_package(&credentials).await?;
    respond(&state, lookup)
}

/// GET /show/logout - drop cached data and blank the stored token (dev only).
pub async fn logout_handler(
    State(state): State<AppState>,
    Query(query): Query<FlowQuery>,
) -> Result<Json<LogoutResponse>> {
    let username = query.username()?;
    state.monitor.logout(&username).await?;
    Ok(Json(LogoutResponse {
        code: 200,
        msg: format!("logged out {}", display(&state, &username)),
    }))
}

/// GET /show/stats - cache occupancy (dev only).
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.monitor.cache_stats().await;
    Json(StatsResponse {
        users: stats.users,
        entries: stats.entries,
        capacity: stats.capacity,
        inflight: state.monitor.inflight().len(),
    })
}

fn respond(state: &AppState, lookup: Lookup) -> Result<Json<FlowResponse>> {
    let data = if state.config.dev {
        lookup.data
    } else {
        lookup.data.masked()
    };
    if lookup.stale {
        tracing::info!(
            kind = %data.kind(),
            refreshed_at = lookup.refreshed_at,
            "Serving stale value"
        );
    }
    let data = to_value(&data)?;
    Ok(Json(FlowResponse {
        code: 200,
        data,
        stale: lookup.stale,
    }))
}

fn to_value(data: &UsageData) -> Result<serde_json::Value> {
    serde_json::to_value(data).map_err(|e| ServerError::Internal(e.to_string()))
}

fn display(state: &AppState, username: &str) -> String {
    if state.config.dev {
        username.to_string()
    } else {
        mask_username(username)
    }
}
