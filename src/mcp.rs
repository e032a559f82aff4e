// src/mcp.rs
// MCP server handler bridging the tool registry onto the rmcp stack

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::{
    ErrorData, ServerHandler,
    model::{
        CallToolRequestParam, CallToolResult, Content, ListToolsResult, PaginatedRequestParam,
        ServerCapabilities, ServerInfo, Tool,
    },
    service::{RequestContext, RoleServer},
};
use serde_json::Value;
use tracing::info;

use crate::error::{Result, ServerError};
use crate::server::AppContext;
use crate::tools::{Registry, ToolDescriptor, error_reply};

/// MCP server state shared across requests.
#[derive(Clone)]
pub struct HubSpotServer {
    ctx: Arc<AppContext>,
    registry: Arc<Registry>,
}

impl HubSpotServer {
    pub fn new(ctx: Arc<AppContext>, registry: Arc<Registry>) -> Self {
        Self { ctx, registry }
    }
}

fn to_rmcp_tool(descriptor: &ToolDescriptor) -> Tool {
    let schema = descriptor
        .input_schema
        .as_object()
        .cloned()
        .unwrap_or_default();
    Tool {
        name: Cow::Borrowed(descriptor.name),
        title: None,
        description: Some(Cow::Borrowed(descriptor.description)),
        input_schema: Arc::new(schema),
        output_schema: None,
        annotations: None,
        icons: None,
        meta: Default::default(),
    }
}

impl ServerHandler for HubSpotServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: rmcp::model::Implementation {
                name: "mcp-hubspot".into(),
                title: Some("HubSpot MCP Server".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Exposes HubSpot CRM as tools: listing, search, deal writes, and semantic search over embedded records.".into(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = std::result::Result<ListToolsResult, ErrorData>> + Send + '_
    {
        std::future::ready(Ok(ListToolsResult {
            tools: self.registry.descriptors().iter().map(to_rmcp_tool).collect(),
            next_cursor: None,
            meta: None,
        }))
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = std::result::Result<CallToolResult, ErrorData>> + Send + '_
    {
        async move {
            let name = request.name.to_string();
            if self.registry.get(&name).is_none() {
                return Err(ErrorData::invalid_params(
                    format!("unknown tool: {name}"),
                    None,
                ));
            }
            let args = request
                .arguments
                .map(Value::Object)
                .unwrap_or(Value::Null);

            match self.registry.dispatch(&self.ctx, &name, args).await {
                Ok(reply) => Ok(CallToolResult {
                    content: vec![
                        Content::text(reply.markdown.clone()),
                        Content::text(reply.json_block()),
                    ],
                    structured_content: None,
                    is_error: Some(false),
                    meta: None,
                }),
                Err(err) => {
                    let reply = error_reply(&err);
                    Ok(CallToolResult {
                        content: vec![
                            Content::text(reply.markdown.clone()),
                            Content::text(reply.json_block()),
                        ],
                        structured_content: None,
                        is_error: Some(true),
                        meta: None,
                    })
                }
            }
        }
    }
}

/// Serve newline-delimited JSON-RPC on stdin/stdout until EOF. Logs stay
/// on stderr; EOF resolves `waiting` and the process exits cleanly.
pub async fn serve_stdio(ctx: Arc<AppContext>, registry: Arc<Registry>) -> Result<()> {
    info!("stdio transport ready");
    let server = HubSpotServer::new(ctx, registry);
    let transport = rmcp::transport::io::stdio();
    let service = rmcp::serve_server(server, transport)
        .await
        .map_err(|err| ServerError::internal(format!("stdio transport failed: {err}")))?;
    tokio::select! {
        result = service.waiting() => {
            result.map_err(|err| ServerError::internal(format!("stdio transport failed: {err}")))?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }
    Ok(())
}
