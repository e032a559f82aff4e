// src/server.rs
// Process orchestration: wires subsystems, owns lifecycle, selects transport

use std::sync::Arc;
use std::time::Duration;

use crate::cache::ToolCache;
use crate::config::{Settings, Transport};
use crate::embeddings::EmbeddingClient;
use crate::error::Result;
use crate::hubspot::HubSpotClient;
use crate::index::EmbeddingManager;
use crate::tools::Registry;

/// Singletons shared by every tool invocation, alive for the whole
/// process. Passed explicitly; there is no global state.
pub struct AppContext {
    pub settings: Settings,
    pub hubspot: Arc<HubSpotClient>,
    pub cache: Arc<ToolCache>,
    pub embeddings: Arc<EmbeddingManager>,
}

impl AppContext {
    pub fn from_settings(settings: Settings) -> Result<Self> {
        settings.validate()?;

        let http = crate::http::create_shared_client(Duration::from_secs(
            settings.crm_timeout_seconds,
        ));
        let hubspot = Arc::new(HubSpotClient::new(
            http.clone(),
            settings.hubspot_base_url.clone(),
            settings.api_key().to_string(),
        )?);
        let cache = Arc::new(ToolCache::new(
            settings.cache_capacity,
            Duration::from_secs(settings.cache_ttl_seconds),
        ));
        let embedder = EmbeddingClient::from_env(http);
        let embeddings = Arc::new(EmbeddingManager::new(
            embedder,
            settings.embeddings_enabled,
        ));

        Ok(Self {
            settings,
            hubspot,
            cache,
            embeddings,
        })
    }
}

/// Build the context and serve on the configured transport until EOF or
/// shutdown signal.
pub async fn run(settings: Settings) -> Result<()> {
    settings.log_status();
    let transport = settings.transport;
    let ctx = Arc::new(AppContext::from_settings(settings)?);
    let registry = Arc::new(Registry::new());

    match transport {
        Transport::Stdio => crate::mcp::serve_stdio(ctx, registry).await,
        Transport::Sse => crate::web::serve_http(ctx, registry).await,
    }
}
