// src/web/admin.rs
// Out-of-band administrative endpoints

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use crate::hubspot::EntityKind;
use crate::index::{DEFAULT_BUILD_LIMIT, IndexAlgorithm};

use super::WebState;

/// GET /health: liveness only, no CRM ping.
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /ready: process is up and configured.
pub async fn ready(State(state): State<WebState>) -> impl IntoResponse {
    let settings = &state.ctx.settings;
    Json(json!({
        "status": "ready",
        "authEnabled": settings.auth_enabled(),
        "authHeader": settings.auth_header,
        "timestamp": Utc::now(),
    }))
}

/// GET /faiss-data: embedding index statistics.
pub async fn faiss_data(State(state): State<WebState>) -> impl IntoResponse {
    let stats = state.ctx.embeddings.stats().await;
    Json(serde_json::to_value(&stats).unwrap_or_else(|_| json!({})))
}

/// POST /force-reindex: clear the cache, rebuild the three primary
/// entity kinds, report progress and final stats.
pub async fn force_reindex(State(state): State<WebState>) -> impl IntoResponse {
    let ctx = &state.ctx;
    let mut progress = Vec::new();

    let cache_report = ctx.cache.clear().await;
    progress.push(format!("cache cleared ({} entries)", cache_report.cleared));
    info!(cleared = cache_report.cleared, "force-reindex: cache cleared");

    let kinds = EntityKind::primary();
    let report = match ctx
        .embeddings
        .build_from_crm(&ctx.hubspot, &kinds, DEFAULT_BUILD_LIMIT, IndexAlgorithm::Flat)
        .await
    {
        Ok(report) => report,
        Err(err) => {
            warn!(error = %err, "force-reindex failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": err.kind(),
                    "message": err.to_string(),
                    "progress": progress,
                })),
            )
                .into_response();
        }
    };

    for outcome in &report.outcomes {
        if outcome.success {
            progress.push(format!(
                "{}: indexed {} of {} records",
                outcome.entity_type, outcome.indexed, outcome.loaded
            ));
        } else {
            progress.push(format!(
                "{}: failed ({})",
                outcome.entity_type,
                outcome.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }

    let final_stats = ctx.embeddings.stats().await;
    Json(json!({
        "progress": progress,
        "successfulEntityTypes": report.successful_entity_types(),
        "totalEntitiesLoaded": report.total_entities_loaded(),
        "finalStats": final_stats,
    }))
    .into_response()
}
