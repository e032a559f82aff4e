// tests/integration.rs
// End-to-end tests: tool dispatch against a mock CRM, transports, auth


use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use mcp_hubspot::config::Settings;
use mcp_hubspot::web::{WebState, create_router, rpc};

use test_utils::{TestContext, settings_for, spawn_mock_hubspot, test_context};

async fn call(
    test: &TestContext,
    tool: &str,
    args: Value,
) -> Result<mcp_hubspot::format::ToolReply, mcp_hubspot::error::ServerError> {
    test.registry.dispatch(&test.ctx, tool, args).await
}

#[tokio::test]
async fn test_list_deals_formats_markdown_and_raw_json() {
    let test = test_context().await;
    let reply = call(&test, "list_hubspot_deals", json!({"limit": 1}))
        .await
        .unwrap();

    assert!(reply.markdown.contains("💼 **Deals** (1 found)"));
    assert!(reply.markdown.contains("**Premium Contract 2024**"));
    assert!(reply.markdown.contains("Amount: €45,000.00"));
    assert!(reply.markdown.contains("Stage: proposal"));
    assert!(reply.markdown.contains("ID: 789012"));

    // the raw block carries the record verbatim
    let record = &reply.raw["results"][0];
    assert_eq!(record["id"], "789012");
    assert_eq!(record["properties"]["dealname"], "Premium Contract 2024");
    assert_eq!(record["properties"]["amount"], "45000");
    let block = reply.json_block();
    assert!(block.starts_with("```json"));
    assert!(block.contains("Premium Contract 2024"));
}

#[tokio::test]
async fn test_concurrent_identical_calls_hit_crm_once() {
    let test = test_context().await;
    let args = json!({"limit": 10});

    let a = call(&test, "list_hubspot_contacts", args.clone());
    let b = call(&test, "list_hubspot_contacts", args.clone());
    let (a, b) = tokio::join!(a, b);
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.markdown, b.markdown);
    assert_eq!(test.mock.list_call_count(), 1);

    // argument order does not defeat the cache key
    call(&test, "list_hubspot_contacts", json!({"limit": 10}))
        .await
        .unwrap();
    assert_eq!(test.mock.list_call_count(), 1);

    // different arguments miss
    call(&test, "list_hubspot_contacts", json!({"limit": 2}))
        .await
        .unwrap();
    assert_eq!(test.mock.list_call_count(), 2);
}

#[tokio::test]
async fn test_limit_boundaries() {
    let test = test_context().await;

    // above the ceiling: clamped to 100 on the wire
    call(&test, "list_hubspot_deals", json!({"limit": 250}))
        .await
        .unwrap();
    assert_eq!(test.mock.last_limit().as_deref(), Some("100"));

    // below the floor: rejected before any request
    let err = call(&test, "list_hubspot_deals", json!({"limit": 0}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "client_error");
}

#[tokio::test]
async fn test_search_deals_with_empty_filters_returns_page() {
    let test = test_context().await;
    let reply = call(&test, "search_hubspot_deals", json!({"filters": {}}))
        .await
        .unwrap();
    assert!(reply.markdown.contains("💼 **Deals** (3 found)"));
}

#[tokio::test]
async fn test_search_deals_by_stage_uses_equality() {
    let test = test_context().await;
    let reply = call(
        &test,
        "search_hubspot_deals",
        json!({"filters": {"dealstage": "proposal"}}),
    )
    .await
    .unwrap();
    assert!(reply.markdown.contains("(1 found)"));
    assert!(reply.markdown.contains("Premium Contract 2024"));
}

#[tokio::test]
async fn test_get_deal_by_name_exact_match_only() {
    let test = test_context().await;
    let reply = call(
        &test,
        "get_deal_by_name",
        json!({"deal_name": "Enterprise Renewal"}),
    )
    .await
    .unwrap();
    assert!(reply.markdown.contains("Enterprise Renewal"));
    assert_eq!(reply.raw["result"]["id"], "789013");

    // token match is not enough; the post-filter demands exact equality
    let err = call(&test, "get_deal_by_name", json!({"deal_name": "Enterprise"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
    let rendered = mcp_hubspot::tools::error_reply(&err);
    assert!(rendered.markdown.starts_with("❌ **Deal Not Found**"));
}

#[tokio::test]
async fn test_create_deal_round_trip() {
    let test = test_context().await;
    let reply = call(
        &test,
        "create_deal",
        json!({"dealname": "New Partnership", "amount": 5000.0, "dealstage": "qualified"}),
    )
    .await
    .unwrap();
    assert!(reply.markdown.starts_with("✅ **Deal Created**"));
    assert_eq!(reply.raw["result"]["properties"]["dealname"], "New Partnership");
    assert_eq!(reply.raw["result"]["properties"]["amount"], "5000");
}

#[tokio::test]
async fn test_update_deal_refuses_empty_properties() {
    let test = test_context().await;
    let err = call(
        &test,
        "update_deal",
        json!({"deal_id": "789012", "properties": {}}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "client_error");
    assert!(err.to_string().contains("at least one property required"));
}

#[tokio::test]
async fn test_update_deal_validates_property_names() {
    let test = test_context().await;
    let err = call(
        &test,
        "update_deal",
        json!({"deal_id": "789012", "properties": {"bogus_field": "x"}}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "client_error");

    let reply = call(
        &test,
        "update_deal",
        json!({"deal_id": "789012", "properties": {"amount": 50000}}),
    )
    .await
    .unwrap();
    assert!(reply.markdown.starts_with("✅ **Deal Updated**"));
    assert_eq!(reply.raw["result"]["properties"]["amount"], "50000");
}

#[tokio::test]
async fn test_deal_properties_schema_rendering() {
    let test = test_context().await;
    let reply = call(&test, "get_hubspot_deal_properties", json!({}))
        .await
        .unwrap();
    assert!(reply.markdown.contains("**Deal Properties**"));
    // five options: three shown, two elided
    assert!(reply.markdown.contains("… and 2 others"));
}

#[tokio::test]
async fn test_semantic_search_ranks_enterprise_deal_first() {
    let test = test_context().await;
    test.mock.set_deals(vec![
        json!({"id": "789013", "properties": {"dealname": "Enterprise Renewal"}}),
        json!({"id": "789014", "properties": {"dealname": "SMB Trial"}}),
    ]);

    let build = call(
        &test,
        "manage_hubspot_embeddings",
        json!({"action": "build", "entity_types": ["deals"]}),
    )
    .await
    .unwrap();
    assert!(build.markdown.contains("1/1 entity types succeeded"));

    let reply = call(
        &test,
        "semantic_search_hubspot",
        json!({
            "query": "enterprise contract",
            "entity_types": ["deals"],
            "search_mode": "semantic",
            "threshold": 0.0
        }),
    )
    .await
    .unwrap();
    let results = reply.raw["results"].as_array().unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0]["id"], "789013", "Enterprise Renewal first");
    let top = results[0]["score"].as_f64().unwrap();
    let runner_up = results
        .get(1)
        .and_then(|r| r["score"].as_f64())
        .unwrap_or(0.0);
    assert!(top > runner_up);
    assert!(top > 0.3);
}

#[tokio::test]
async fn test_auto_mode_uses_semantic_when_ready_else_hybrid() {
    let test = test_context().await;

    // nothing built, query has extractable words: hybrid via the API side
    let reply = call(
        &test,
        "semantic_search_hubspot",
        json!({"query": "Premium", "entity_types": ["deals"]}),
    )
    .await
    .unwrap();
    assert_eq!(reply.raw["mode"], "auto (hybrid)");
    assert_eq!(reply.raw["results"][0]["id"], "789012");

    // after a build, auto switches to the vector side
    call(
        &test,
        "manage_hubspot_embeddings",
        json!({"action": "build", "entity_types": ["deals"]}),
    )
    .await
    .unwrap();
    let reply = call(
        &test,
        "semantic_search_hubspot",
        json!({"query": "Premium Contract", "entity_types": ["deals"], "threshold": 0.0}),
    )
    .await
    .unwrap();
    assert_eq!(reply.raw["mode"], "auto (semantic)");
}

#[tokio::test]
async fn test_semantic_mode_without_index_is_not_ready() {
    let test = test_context().await;
    let err = call(
        &test,
        "semantic_search_hubspot",
        json!({"query": "anything", "search_mode": "semantic"}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "not_ready");
}

#[tokio::test]
async fn test_embeddings_clear_then_stats_round_trip() {
    let test = test_context().await;
    call(
        &test,
        "manage_hubspot_embeddings",
        json!({"action": "build", "entity_types": ["deals"]}),
    )
    .await
    .unwrap();

    call(
        &test,
        "manage_hubspot_embeddings",
        json!({"action": "clear", "entity_types": ["deals"]}),
    )
    .await
    .unwrap();

    let info = call(&test, "manage_hubspot_embeddings", json!({"action": "info"}))
        .await
        .unwrap();
    assert_eq!(info.raw["totalCount"], 0);
    assert_eq!(info.raw["perKind"]["deals"]["status"], "empty");
}

#[tokio::test]
async fn test_cache_clear_then_info_reports_empty() {
    let test = test_context().await;
    call(&test, "list_hubspot_deals", json!({"limit": 1}))
        .await
        .unwrap();

    let info = call(&test, "manage_hubspot_cache", json!({"action": "info"}))
        .await
        .unwrap();
    assert_eq!(info.raw["size"], 1);

    call(&test, "manage_hubspot_cache", json!({"action": "clear"}))
        .await
        .unwrap();
    let info = call(&test, "manage_hubspot_cache", json!({"action": "info"}))
        .await
        .unwrap();
    assert_eq!(info.raw["size"], 0);
}

#[tokio::test]
async fn test_load_entities_fills_cache_and_optionally_builds() {
    let test = test_context().await;
    let reply = call(
        &test,
        "load_hubspot_entities_to_cache",
        json!({"entity_type": "deals", "build_embeddings": true}),
    )
    .await
    .unwrap();
    assert_eq!(reply.raw["loaded"], 3);
    assert!(reply.raw["buildOutcome"]["success"].as_bool().unwrap());

    let info = call(&test, "manage_hubspot_cache", json!({"action": "info"}))
        .await
        .unwrap();
    assert_eq!(info.raw["fullRecords"], 3);

    let stats = call(&test, "manage_hubspot_embeddings", json!({"action": "info"}))
        .await
        .unwrap();
    assert_eq!(stats.raw["perKind"]["deals"]["status"], "ready");
}

#[tokio::test]
async fn test_load_entities_zero_cap_means_uncapped() {
    let test = test_context().await;
    let reply = call(
        &test,
        "load_hubspot_entities_to_cache",
        json!({"entity_type": "deals", "max_entities": 0}),
    )
    .await
    .unwrap();
    assert_eq!(reply.raw["loaded"], 3);
}

#[tokio::test]
async fn test_browse_indexed_data() {
    let test = test_context().await;
    call(
        &test,
        "manage_hubspot_embeddings",
        json!({"action": "build", "entity_types": ["deals"]}),
    )
    .await
    .unwrap();

    let page = call(
        &test,
        "browse_hubspot_indexed_data",
        json!({"action": "list", "entity_type": "deals", "limit": 2}),
    )
    .await
    .unwrap();
    assert_eq!(page.raw["total"], 3);
    assert_eq!(page.raw["entries"].as_array().unwrap().len(), 2);

    let found = call(
        &test,
        "browse_hubspot_indexed_data",
        json!({"action": "search", "search_text": "premium contract"}),
    )
    .await
    .unwrap();
    assert_eq!(found.raw["total"], 1);

    let err = call(
        &test,
        "browse_hubspot_indexed_data",
        json!({"action": "search"}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "client_error");
}

#[tokio::test]
async fn test_unknown_tool_and_unknown_entity_type() {
    let test = test_context().await;
    let err = call(&test, "no_such_tool", json!({})).await.unwrap_err();
    assert_eq!(err.kind(), "client_error");

    let err = call(
        &test,
        "semantic_search_hubspot",
        json!({"query": "x", "entity_types": ["tickets"]}),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("tickets"));
}

// ---------------------------------------------------------------------------
// JSON-RPC core (shared by the SSE ingress)
// ---------------------------------------------------------------------------

fn rpc_request(method: &str, params: Value) -> rpc::JsonRpcRequest {
    serde_json::from_value(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    }))
    .unwrap()
}

#[tokio::test]
async fn test_rpc_tools_list_exposes_all_tools() {
    let test = test_context().await;
    let response = rpc::handle_request(&test.ctx, &test.registry, rpc_request("tools/list", json!({})))
        .await
        .unwrap();
    let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
    assert_eq!(tools, 18);
}

#[tokio::test]
async fn test_rpc_tools_call_wraps_markdown_and_json() {
    let test = test_context().await;
    let response = rpc::handle_request(
        &test.ctx,
        &test.registry,
        rpc_request(
            "tools/call",
            json!({"name": "list_hubspot_deals", "arguments": {"limit": 1}}),
        ),
    )
    .await
    .unwrap();
    let result = response.result.unwrap();
    assert_eq!(result["isError"], false);
    let content = result["content"].as_array().unwrap();
    assert_eq!(content.len(), 2);
    assert!(content[0]["text"].as_str().unwrap().contains("Premium Contract 2024"));
    assert!(content[1]["text"].as_str().unwrap().starts_with("```json"));
}

#[tokio::test]
async fn test_rpc_tool_failures_are_results_not_protocol_errors() {
    let test = test_context().await;
    let response = rpc::handle_request(
        &test.ctx,
        &test.registry,
        rpc_request(
            "tools/call",
            json!({"name": "update_deal", "arguments": {"deal_id": "1", "properties": {}}}),
        ),
    )
    .await
    .unwrap();
    let result = response.result.unwrap();
    assert_eq!(result["isError"], true);
    assert!(result["content"][0]["text"].as_str().unwrap().starts_with("❌"));
}

#[tokio::test]
async fn test_rpc_unknown_method_and_notifications() {
    let test = test_context().await;
    let response = rpc::handle_request(&test.ctx, &test.registry, rpc_request("prompts/list", json!({})))
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, rpc::METHOD_NOT_FOUND);

    let notification = serde_json::from_value(json!({
        "jsonrpc": "2.0",
        "method": "notifications/initialized"
    }))
    .unwrap();
    assert!(
        rpc::handle_request(&test.ctx, &test.registry, notification)
            .await
            .is_none()
    );
}

// ---------------------------------------------------------------------------
// HTTP transport: auth matrix and admin endpoints
// ---------------------------------------------------------------------------

fn router_with(test: &TestContext, mutate: impl FnOnce(&mut Settings)) -> axum::Router {
    let mut settings = test.ctx.settings.clone();
    mutate(&mut settings);
    let ctx = Arc::new(mcp_hubspot::server::AppContext {
        settings,
        hubspot: test.ctx.hubspot.clone(),
        cache: test.ctx.cache.clone(),
        embeddings: test.ctx.embeddings.clone(),
    });
    create_router(WebState::new(ctx, test.registry.clone()))
}

#[tokio::test]
async fn test_auth_matrix() {
    let test = test_context().await;
    let app = router_with(&test, |s| s.auth_key = Some("secret".into()));

    // missing header on a protected path
    let response = app
        .clone()
        .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "Unauthorized");
    assert_eq!(body["message"], "Invalid API key");

    // wrong key
    let response = app
        .clone()
        .oneshot(
            Request::get("/sse")
                .header("X-API-Key", "nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // correct key opens the stream
    let response = app
        .clone()
        .oneshot(
            Request::get("/sse")
                .header("X-API-Key", "secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    // header names are case-insensitive
    let response = app
        .clone()
        .oneshot(
            Request::get("/sse")
                .header("x-api-key", "secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // exempt paths pass without the header
    let response = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_auth_disabled_passes_everything() {
    let test = test_context().await;
    let app = router_with(&test, |_| {});
    let response = app
        .oneshot(Request::get("/faiss-data").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_exemption_toggles() {
    let test = test_context().await;

    // faiss_data_secure=false exempts /faiss-data even with auth on
    let app = router_with(&test, |s| {
        s.auth_key = Some("secret".into());
        s.faiss_data_secure = false;
    });
    let response = app
        .clone()
        .oneshot(Request::get("/faiss-data").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    // but /force-reindex stays protected
    let response = app
        .oneshot(Request::post("/force-reindex").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_and_ready_payloads() {
    let test = test_context().await;
    let app = router_with(&test, |s| s.auth_key = Some("secret".into()));

    let response = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());

    let response = app
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["authEnabled"], true);
    assert_eq!(body["authHeader"], "X-API-Key");
}

#[tokio::test]
async fn test_messages_unknown_session_is_404() {
    let test = test_context().await;
    let app = router_with(&test, |_| {});

    let request = Request::post(format!("/messages/{}", uuid::Uuid::new_v4()))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_force_reindex_reports_three_kinds_and_final_stats() {
    let test = test_context().await;
    let app = router_with(&test, |_| {});

    let response = app
        .oneshot(Request::post("/force-reindex").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(body["successfulEntityTypes"], 3);
    // one contact + one company + three deals from the fixtures
    assert_eq!(body["totalEntitiesLoaded"], 5);
    assert_eq!(body["finalStats"]["status"], "ready");
    assert_eq!(body["finalStats"]["perKind"]["deals"]["count"], 3);
    assert!(body["progress"].as_array().unwrap().len() >= 4);
}

#[tokio::test]
async fn test_settings_from_flags() {
    let (base_url, _mock) = spawn_mock_hubspot().await;
    let settings = settings_for(&base_url);
    assert!(settings.validate().is_ok());
    assert_eq!(settings.cache_capacity, 1000);
    assert!(!settings.auth_enabled());
}
