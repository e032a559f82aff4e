// src/web/auth.rs
// Header-keyed shared-secret middleware for the HTTP transport

use axum::{
    extract::{Request, State},
    http::{HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::debug;

use super::WebState;

/// Paths that never require the shared secret.
const ALWAYS_EXEMPT: &[&str] = &["/health", "/ready"];

pub async fn require_auth(State(state): State<WebState>, request: Request, next: Next) -> Response {
    let settings = &state.ctx.settings;
    if !settings.auth_enabled() {
        return next.run(request).await;
    }

    let path = request.uri().path();
    if is_exempt(&state, path) {
        return next.run(request).await;
    }

    let expected = settings.auth_key.as_deref().unwrap_or_default();
    let provided = HeaderName::try_from(settings.auth_header.as_str())
        .ok()
        .and_then(|name| request.headers().get(&name))
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(value) if constant_time_eq(value.as_bytes(), expected.as_bytes()) => {
            next.run(request).await
        }
        _ => {
            debug!(path, "rejected request without valid API key");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Unauthorized",
                    "message": "Invalid API key",
                })),
            )
                .into_response()
        }
    }
}

fn is_exempt(state: &WebState, path: &str) -> bool {
    if ALWAYS_EXEMPT.contains(&path) {
        return true;
    }
    let settings = &state.ctx.settings;
    match path {
        "/faiss-data" => !settings.faiss_data_secure,
        "/force-reindex" => settings.data_protection_disabled,
        _ => false,
    }
}

/// Compare without early exit so the timing does not leak the match
/// prefix length.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
