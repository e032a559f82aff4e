// src/web/sse.rs
// SSE session transport: event stream plus correlated POST message ingress

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use super::WebState;
use super::rpc::{self, JsonRpcRequest, JsonRpcResponse};

/// Per-session outbound queue bound; overflow terminates the session.
pub const SESSION_QUEUE_CAPACITY: usize = 64;

/// Live SSE sessions. The map holds each session's only sender; removing
/// an entry closes the stream.
pub type SessionMap = Arc<Mutex<HashMap<Uuid, mpsc::Sender<JsonRpcResponse>>>>;

/// Removes the session when the response stream is dropped (client
/// disconnect or queue overflow).
struct SessionGuard {
    id: Uuid,
    sessions: SessionMap,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.lock().expect("session map lock").remove(&self.id);
        info!(session = %self.id, "SSE session closed");
    }
}

/// GET /sse: open a stream, announce the POST endpoint for this session,
/// then relay JSON-RPC responses as `message` events.
pub async fn sse_handler(
    State(state): State<WebState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel::<JsonRpcResponse>(SESSION_QUEUE_CAPACITY);
    state
        .sessions
        .lock()
        .expect("session map lock")
        .insert(session_id, tx);
    info!(session = %session_id, "SSE session opened");

    let sessions = state.sessions.clone();
    let stream = async_stream::stream! {
        let _guard = SessionGuard { id: session_id, sessions };
        yield Ok(Event::default()
            .event("endpoint")
            .data(format!("/messages/{session_id}")));
        while let Some(response) = rx.recv().await {
            let data = serde_json::to_string(&response).unwrap_or_default();
            yield Ok(Event::default().event("message").data(data));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// POST /messages/{session}: accept a JSON-RPC request for an open
/// session. The response travels over the SSE stream, not this POST; the
/// POST acknowledges with 202, or 404 for an unknown session.
pub async fn message_handler(
    State(state): State<WebState>,
    Path(session): Path<String>,
    Json(request): Json<JsonRpcRequest>,
) -> StatusCode {
    let Ok(session_id) = Uuid::parse_str(&session) else {
        return StatusCode::NOT_FOUND;
    };
    let sender = state
        .sessions
        .lock()
        .expect("session map lock")
        .get(&session_id)
        .cloned();
    let Some(sender) = sender else {
        return StatusCode::NOT_FOUND;
    };

    let ctx = state.ctx.clone();
    let registry = state.registry.clone();
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let Some(response) = rpc::handle_request(&ctx, &registry, request).await else {
            return;
        };
        if sender.try_send(response).is_err() {
            // full queue or torn-down stream; drop the session entirely
            warn!(session = %session_id, "SSE queue overflow, terminating session");
            sessions
                .lock()
                .expect("session map lock")
                .remove(&session_id);
        }
    });

    StatusCode::ACCEPTED
}
