// src/web/mod.rs
// HTTP layer: SSE transport, auth middleware, admin endpoints

mod admin;
mod auth;
pub mod rpc;
mod sse;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{Result, ServerError};
use crate::server::AppContext;
use crate::tools::Registry;

pub use sse::SESSION_QUEUE_CAPACITY;

/// Shared HTTP state: the app singletons plus the live SSE sessions.
#[derive(Clone)]
pub struct WebState {
    pub ctx: Arc<AppContext>,
    pub registry: Arc<Registry>,
    pub sessions: sse::SessionMap,
}

impl WebState {
    pub fn new(ctx: Arc<AppContext>, registry: Arc<Registry>) -> Self {
        Self {
            ctx,
            registry,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

/// Create the HTTP router: transport endpoints behind auth, admin
/// endpoints with their own exemption rules.
pub fn create_router(state: WebState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(admin::health))
        .route("/ready", get(admin::ready))
        .route("/sse", get(sse::sse_handler))
        .route("/messages/{session}", post(sse::message_handler))
        .route("/faiss-data", get(admin::faiss_data))
        .route("/force-reindex", post(admin::force_reindex))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve the SSE transport until a shutdown signal.
pub async fn serve_http(ctx: Arc<AppContext>, registry: Arc<Registry>) -> Result<()> {
    let addr = format!("{}:{}", ctx.settings.host, ctx.settings.port);
    let state = WebState::new(ctx, registry);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|err| ServerError::internal(format!("failed to bind {addr}: {err}")))?;
    info!(%addr, "SSE transport listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| ServerError::internal(format!("HTTP server failed: {err}")))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
