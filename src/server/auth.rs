//! Admin key check for state-changing endpoints

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::error::{Result, ServerError};
use super::state::AppState;

/// Header carrying the admin key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Admit the request only when `x-api-key` matches the configured admin key.
///
/// Without a configured key the guarded routes are disabled outright.
pub async fn require_admin_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let Some(expected) = state.config.admin_api_key.as_deref() else {
        return Err(ServerError::Forbidden(
            "model management is disabled; set ADMIN_API_KEY to enable it".into(),
        ));
    };

    let verdict = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|key| keys_match(key, expected));
    match verdict {
        Some(true) => Ok(next.run(request).await),
        Some(false) => {
            warn!(path = %request.uri().path(), "Rejected request with a wrong admin key");
            Err(ServerError::Unauthorized("invalid admin key".into()))
        }
        None => Err(ServerError::Unauthorized(format!("missing {API_KEY_HEADER} header"))),
    }
}

/// Length-independent comparison of every byte
fn keys_match(provided: &str, expected: &str) -> bool {
    let (a, b) = (provided.as_bytes(), expected.as_bytes());
    let diff = a
        .iter()
        .zip(b)
        .fold(a.len() ^ b.len(), |acc, (x, y)| acc | usize::from(x ^ y));
    diff == 0
}
