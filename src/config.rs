// src/config.rs
// Runtime configuration - single source of truth for flags and env vars

use clap::{Parser, ValueEnum};

use crate::error::{Result, ServerError};

/// Which front the server speaks on
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// Newline-delimited JSON-RPC on stdin/stdout
    Stdio,
    /// HTTP server with an SSE event channel and POST message ingress
    Sse,
}

/// Server configuration. Every option is a flag and an environment
/// variable; flags win.
#[derive(Debug, Clone, Parser)]
#[command(name = "mcp-hubspot", version, about = "HubSpot MCP server")]
pub struct Settings {
    /// HubSpot private app token (Bearer)
    #[arg(long, env = "HUBSPOT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// HubSpot API base URL (override for testing)
    #[arg(long, env = "HUBSPOT_BASE_URL", default_value = "https://api.hubapi.com")]
    pub hubspot_base_url: String,

    /// Transport to serve on
    #[arg(long, env = "MCP_TRANSPORT", value_enum, default_value = "stdio")]
    pub transport: Transport,

    /// Bind host for the SSE transport
    #[arg(long, env = "MCP_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Bind port for the SSE transport
    #[arg(long, env = "MCP_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Shared secret for the SSE transport; empty disables auth
    #[arg(long, env = "MCP_AUTH_KEY", hide_env_values = true)]
    pub auth_key: Option<String>,

    /// Header carrying the shared secret
    #[arg(long, env = "MCP_AUTH_HEADER", default_value = "X-API-Key")]
    pub auth_header: String,

    /// Maximum number of cached tool results
    #[arg(long, env = "CACHE_CAPACITY", default_value_t = 1000)]
    pub cache_capacity: u64,

    /// Cached tool result lifetime in seconds
    #[arg(long, env = "CACHE_TTL_SECONDS", default_value_t = 300)]
    pub cache_ttl_seconds: u64,

    /// Disable to make every embedding tool report that the feature is off
    #[arg(long, env = "EMBEDDINGS_ENABLED", default_value_t = true, action = clap::ArgAction::Set)]
    pub embeddings_enabled: bool,

    /// When false, GET /faiss-data skips authentication
    #[arg(long, env = "FAISS_DATA_SECURE", default_value_t = true, action = clap::ArgAction::Set)]
    pub faiss_data_secure: bool,

    /// When true, POST /force-reindex skips authentication
    #[arg(long, env = "DATA_PROTECTION_DISABLED", default_value_t = false, action = clap::ArgAction::Set)]
    pub data_protection_disabled: bool,

    /// Per-call timeout for HubSpot API requests, seconds
    #[arg(long, env = "CRM_TIMEOUT_SECONDS", default_value_t = 30)]
    pub crm_timeout_seconds: u64,

    /// Wall-clock budget for a single tool execution, seconds
    #[arg(long, env = "TOOL_TIMEOUT_SECONDS", default_value_t = 60)]
    pub tool_timeout_seconds: u64,
}

impl Settings {
    /// Validate settings that cannot be expressed as clap constraints.
    /// The API key is required for any real serving; empty strings read
    /// from the environment count as unset.
    pub fn validate(&self) -> Result<()> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(()),
            _ => Err(ServerError::config(
                "HUBSPOT_API_KEY is required (set the env var or pass --api-key)",
            )),
        }
    }

    /// The validated bearer token.
    pub fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }

    /// Auth is on iff a non-empty key is configured.
    pub fn auth_enabled(&self) -> bool {
        self.auth_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }

    /// Log the effective configuration without exposing secret values.
    pub fn log_status(&self) {
        tracing::info!(
            transport = ?self.transport,
            auth = self.auth_enabled(),
            embeddings = self.embeddings_enabled,
            cache_capacity = self.cache_capacity,
            cache_ttl_s = self.cache_ttl_seconds,
            "configuration loaded"
        );
    }

    #[cfg(test)]
    pub fn for_tests(base_url: String) -> Self {
        Settings {
            api_key: Some("test-key".into()),
            hubspot_base_url: base_url,
            transport: Transport::Stdio,
            host: "127.0.0.1".into(),
            port: 0,
            auth_key: None,
            auth_header: "X-API-Key".into(),
            cache_capacity: 1000,
            cache_ttl_seconds: 300,
            embeddings_enabled: true,
            faiss_data_secure: true,
            data_protection_disabled: false,
            crm_timeout_seconds: 5,
            tool_timeout_seconds: 30,
        }
    }
}
