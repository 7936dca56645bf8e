//! API-key gate for the query routes.
//!
//! The key travels as the `key` query parameter. A missing key is a 401, a
//! wrong one a 403; either way the request never reaches the handler.
//!
//! # Security
//!
//! Key comparison uses constant-time comparison to prevent timing attacks.

use axum::{
    body::Body,
    extract::{Query, Request, State},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::error::ServerError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct KeyParam {
    key: Option<String>,
}

/// Compare two strings in constant time.
///
/// Lengths are compared first; on mismatch a dummy comparison keeps the
/// timing similar.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    if a_bytes.len() == b_bytes.len() {
        a_bytes.ct_eq(b_bytes).into()
    } else {
        let _ = a_bytes.ct_eq(a_bytes);
        false
    }
}

/// Authentication middleware function.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    validate_request(&request, &state)?;
    Ok(next.run(request).await)
}

fn validate_request(request: &Request<Body>, state: &AppState) -> Result<(), ServerError> {
    // No key configured: open access.
    let Some(expected) = state.config().api_key.as_deref() else {
        return Ok(());
    };

    let provided = Query::<KeyParam>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(p)| p.key)
        .filter(|k| !k.is_empty())
        .ok_or(ServerError::MissingKey)?;

    if constant_time_eq(&provided, expected) {
        Ok(())
    } else {
        tracing::warn!(
            method = %request.method(),
            path = %request.uri().path(),
            "Rejected request with invalid API key"
        );
        Err(ServerError::InvalidKey)
    }
}
