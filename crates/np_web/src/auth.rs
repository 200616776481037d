use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Key from `Authorization: Bearer <key>`, else from `X-API-Key`.
fn provided_key(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    bearer
        .or_else(|| headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()).map(str::trim))
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}

pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.auth_enabled() {
        return Ok(next.run(request).await);
    }
    match provided_key(request.headers()) {
        Some(key) if state.api_keys.contains(&key) => {
            debug!("valid API key provided");
            Ok(next.run(request).await)
        }
        Some(_) => {
            warn!(path = %request.uri().path(), "invalid API key provided");
            Err(ApiError::unauthorized("invalid API key"))
        }
        None => Err(ApiError::unauthorized(
            "API key missing: send Authorization: Bearer <key> or X-API-Key",
        )),
    }
}
