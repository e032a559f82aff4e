// src/web/rpc.rs
// JSON-RPC 2.0 handling shared by the SSE message ingress

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::server::AppContext;
use crate::tools::{Registry, error_reply};

pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn result(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Handle one request against the shared dispatcher core. Notifications
/// (no id) produce no response.
pub async fn handle_request(
    ctx: &AppContext,
    registry: &Registry,
    request: JsonRpcRequest,
) -> Option<JsonRpcResponse> {
    if request.method.starts_with("notifications/") {
        return None;
    }
    let id = request.id.clone();

    let response = match request.method.as_str() {
        "initialize" => JsonRpcResponse::result(
            id,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": "mcp-hubspot",
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        ),
        "ping" => JsonRpcResponse::result(id, json!({})),
        "tools/list" => {
            let tools: Vec<Value> = registry
                .descriptors()
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "inputSchema": tool.input_schema,
                    })
                })
                .collect();
            JsonRpcResponse::result(id, json!({ "tools": tools }))
        }
        "tools/call" => {
            let name = request.params.get("name").and_then(Value::as_str);
            let Some(name) = name else {
                return Some(JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    "params.name is required",
                ));
            };
            if registry.get(name).is_none() {
                return Some(JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!("unknown tool: {name}"),
                ));
            }
            let arguments = request
                .params
                .get("arguments")
                .cloned()
                .unwrap_or(Value::Null);

            let (reply, is_error) = match registry.dispatch(ctx, name, arguments).await {
                Ok(reply) => (reply, false),
                Err(err) => (error_reply(&err), true),
            };
            JsonRpcResponse::result(
                id,
                json!({
                    "content": [
                        { "type": "text", "text": reply.markdown },
                        { "type": "text", "text": reply.json_block() },
                    ],
                    "isError": is_error,
                }),
            )
        }
        other => JsonRpcResponse::error(
            id,
            METHOD_NOT_FOUND,
            format!("method not supported: {other}"),
        ),
    };
    Some(response)
}
