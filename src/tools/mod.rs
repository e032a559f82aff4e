// src/tools/mod.rs
// Tool registry and dispatcher: validation, caching, timeout, error mapping

pub mod requests;

mod admin;
mod deals;
mod listing;
mod properties;
mod search;
mod semantic;

use std::time::Duration;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::cache::ToolCache;
use crate::error::{Result, ServerError};
use crate::format::ToolReply;
use crate::hubspot::EntityKind;
use crate::server::AppContext;

use requests::*;

type Executor = for<'a> fn(&'a AppContext, Value) -> BoxFuture<'a, Result<ToolReply>>;

/// One named, schema-validated procedure. Immutable for the process
/// lifetime; owned by the registry.
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    /// Read-only tools run through the shared TTL cache
    pub read_only: bool,
    run: Executor,
}

/// Holds the tool set and routes calls to executors. Both transports share
/// one registry instance.
pub struct Registry {
    tools: Vec<ToolDescriptor>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let tools = vec![
            descriptor::<ListRequest>(
                "list_hubspot_contacts",
                "List one page of HubSpot contacts with cursor pagination.",
                true,
                run_list_contacts,
            ),
            descriptor::<ListRequest>(
                "list_hubspot_companies",
                "List one page of HubSpot companies with cursor pagination.",
                true,
                run_list_companies,
            ),
            descriptor::<ListRequest>(
                "list_hubspot_deals",
                "List one page of HubSpot deals with cursor pagination.",
                true,
                run_list_deals,
            ),
            descriptor::<ListRequest>(
                "list_hubspot_engagements",
                "List one page of HubSpot engagements with cursor pagination.",
                true,
                run_list_engagements,
            ),
            descriptor::<EmptyRequest>(
                "get_hubspot_contact_properties",
                "Full property schema for contacts, grouped by property group.",
                true,
                run_contact_properties,
            ),
            descriptor::<EmptyRequest>(
                "get_hubspot_company_properties",
                "Full property schema for companies, grouped by property group.",
                true,
                run_company_properties,
            ),
            descriptor::<EmptyRequest>(
                "get_hubspot_deal_properties",
                "Full property schema for deals, grouped by property group.",
                true,
                run_deal_properties,
            ),
            descriptor::<SearchContactsRequest>(
                "search_hubspot_contacts",
                "Search contacts by email, first name, last name, or company.",
                true,
                run_search_contacts,
            ),
            descriptor::<SearchCompaniesRequest>(
                "search_hubspot_companies",
                "Search companies by name, domain, industry, or country.",
                true,
                run_search_companies,
            ),
            descriptor::<SearchDealsRequest>(
                "search_hubspot_deals",
                "Search deals by name, owner, stage, or pipeline.",
                true,
                run_search_deals,
            ),
            descriptor::<GetDealByNameRequest>(
                "get_deal_by_name",
                "Look up a single deal by its exact name.",
                true,
                run_get_deal_by_name,
            ),
            descriptor::<CreateDealRequest>(
                "create_deal",
                "Create a new deal.",
                false,
                run_create_deal,
            ),
            descriptor::<UpdateDealRequest>(
                "update_deal",
                "Update properties of an existing deal. Requires at least one property.",
                false,
                run_update_deal,
            ),
            descriptor::<SemanticSearchRequest>(
                "semantic_search_hubspot",
                "Search CRM records by meaning. Modes: semantic (vector), hybrid (vector + API search), auto. With partially built indices, auto searches the ready entity types only.",
                false,
                run_semantic_search,
            ),
            descriptor::<ManageEmbeddingsRequest>(
                "manage_hubspot_embeddings",
                "Manage the vector indices: info, build, rebuild, clear.",
                false,
                run_manage_embeddings,
            ),
            descriptor::<BrowseIndexedRequest>(
                "browse_hubspot_indexed_data",
                "Browse the indexed records: list, stats, search (substring filter).",
                false,
                run_browse_indexed,
            ),
            descriptor::<LoadEntitiesRequest>(
                "load_hubspot_entities_to_cache",
                "Bulk-load one entity type with all custom properties into the cache, optionally rebuilding its embedding index.",
                false,
                run_load_entities,
            ),
            descriptor::<ManageCacheRequest>(
                "manage_hubspot_cache",
                "Inspect or clear the shared result cache: info, clear.",
                false,
                run_manage_cache,
            ),
        ];
        Self { tools }
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    /// Validate, execute under the wall-clock budget, and cache read-only
    /// results. Loader errors are never cached.
    pub async fn dispatch(&self, ctx: &AppContext, name: &str, args: Value) -> Result<ToolReply> {
        let tool = self
            .get(name)
            .ok_or_else(|| ServerError::client(format!("unknown tool: {name}")))?;
        let args = if args.is_null() { json!({}) } else { args };

        let budget = Duration::from_secs(ctx.settings.tool_timeout_seconds);
        let execution = async {
            if tool.read_only {
                let key = ToolCache::key(name, &args, ctx.hubspot.api_key());
                ctx.cache
                    .get_or_compute(key, (tool.run)(ctx, args))
                    .await
                    .map(|shared| (*shared).clone())
            } else {
                (tool.run)(ctx, args).await
            }
        };

        match tokio::time::timeout(budget, execution).await {
            Ok(result) => result,
            Err(_) => Err(ServerError::Timeout(ctx.settings.tool_timeout_seconds)),
        }
    }
}

// Executor wrappers: deserialize arguments, call the module function. Kept
// as plain fns so they coerce to the higher-ranked pointer type above.

fn run_list_contacts(ctx: &AppContext, args: Value) -> BoxFuture<'_, Result<ToolReply>> {
    Box::pin(async move { listing::list_entities(ctx, EntityKind::Contact, parse_args(args)?).await })
}

fn run_list_companies(ctx: &AppContext, args: Value) -> BoxFuture<'_, Result<ToolReply>> {
    Box::pin(async move { listing::list_entities(ctx, EntityKind::Company, parse_args(args)?).await })
}

fn run_list_deals(ctx: &AppContext, args: Value) -> BoxFuture<'_, Result<ToolReply>> {
    Box::pin(async move { listing::list_entities(ctx, EntityKind::Deal, parse_args(args)?).await })
}

fn run_list_engagements(ctx: &AppContext, args: Value) -> BoxFuture<'_, Result<ToolReply>> {
    Box::pin(async move {
        listing::list_entities(ctx, EntityKind::Engagement, parse_args(args)?).await
    })
}

fn run_contact_properties(ctx: &AppContext, args: Value) -> BoxFuture<'_, Result<ToolReply>> {
    Box::pin(async move {
        let _: EmptyRequest = parse_args(args)?;
        properties::get_properties(ctx, EntityKind::Contact).await
    })
}

fn run_company_properties(ctx: &AppContext, args: Value) -> BoxFuture<'_, Result<ToolReply>> {
    Box::pin(async move {
        let _: EmptyRequest = parse_args(args)?;
        properties::get_properties(ctx, EntityKind::Company).await
    })
}

fn run_deal_properties(ctx: &AppContext, args: Value) -> BoxFuture<'_, Result<ToolReply>> {
    Box::pin(async move {
        let _: EmptyRequest = parse_args(args)?;
        properties::get_properties(ctx, EntityKind::Deal).await
    })
}

fn run_search_contacts(ctx: &AppContext, args: Value) -> BoxFuture<'_, Result<ToolReply>> {
    Box::pin(async move { search::search_contacts(ctx, parse_args(args)?).await })
}

fn run_search_companies(ctx: &AppContext, args: Value) -> BoxFuture<'_, Result<ToolReply>> {
    Box::pin(async move { search::search_companies(ctx, parse_args(args)?).await })
}

fn run_search_deals(ctx: &AppContext, args: Value) -> BoxFuture<'_, Result<ToolReply>> {
    Box::pin(async move { search::search_deals(ctx, parse_args(args)?).await })
}

fn run_get_deal_by_name(ctx: &AppContext, args: Value) -> BoxFuture<'_, Result<ToolReply>> {
    Box::pin(async move { search::get_deal_by_name(ctx, parse_args(args)?).await })
}

fn run_create_deal(ctx: &AppContext, args: Value) -> BoxFuture<'_, Result<ToolReply>> {
    Box::pin(async move { deals::create_deal(ctx, parse_args(args)?).await })
}

fn run_update_deal(ctx: &AppContext, args: Value) -> BoxFuture<'_, Result<ToolReply>> {
    Box::pin(async move { deals::update_deal(ctx, parse_args(args)?).await })
}

fn run_semantic_search(ctx: &AppContext, args: Value) -> BoxFuture<'_, Result<ToolReply>> {
    Box::pin(async move { semantic::semantic_search(ctx, parse_args(args)?).await })
}

fn run_manage_embeddings(ctx: &AppContext, args: Value) -> BoxFuture<'_, Result<ToolReply>> {
    Box::pin(async move { admin::manage_embeddings(ctx, parse_args(args)?).await })
}

fn run_browse_indexed(ctx: &AppContext, args: Value) -> BoxFuture<'_, Result<ToolReply>> {
    Box::pin(async move { admin::browse_indexed(ctx, parse_args(args)?).await })
}

fn run_load_entities(ctx: &AppContext, args: Value) -> BoxFuture<'_, Result<ToolReply>> {
    Box::pin(async move { admin::load_entities(ctx, parse_args(args)?).await })
}

fn run_manage_cache(ctx: &AppContext, args: Value) -> BoxFuture<'_, Result<ToolReply>> {
    Box::pin(async move { admin::manage_cache(ctx, parse_args(args)?).await })
}

fn descriptor<T: schemars::JsonSchema>(
    name: &'static str,
    description: &'static str,
    read_only: bool,
    run: Executor,
) -> ToolDescriptor {
    ToolDescriptor {
        name,
        description,
        input_schema: schema_of::<T>(),
        read_only,
        run,
    }
}

fn schema_of<T: schemars::JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| json!({"type": "object"}))
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    serde_json::from_value(args)
        .map_err(|err| ServerError::client(format!("invalid arguments: {err}")))
}

/// Parse user-supplied entity type names; absent or empty means all kinds.
pub(crate) fn parse_kinds(entity_types: &Option<Vec<String>>) -> Result<Vec<EntityKind>> {
    match entity_types {
        None => Ok(EntityKind::all().to_vec()),
        Some(names) if names.is_empty() => Ok(EntityKind::all().to_vec()),
        Some(names) => names
            .iter()
            .map(|name| {
                EntityKind::parse(name).ok_or_else(|| {
                    ServerError::client(format!(
                        "unknown entity type '{name}' (expected contacts, companies, deals, or engagements)"
                    ))
                })
            })
            .collect(),
    }
}

/// User-visible rendering of an executor failure: ❌ Markdown plus the
/// structured error kind, both sent to the client.
pub fn error_reply(err: &ServerError) -> ToolReply {
    let markdown = match err {
        ServerError::NotFound { what, reason } => crate::format::render_not_found(what, reason),
        other => format!("❌ **Error**\n\n{other}\n"),
    };
    let mut error = json!({
        "kind": err.kind(),
        "message": err.to_string(),
    });
    if let ServerError::Transient {
        retry_after: Some(seconds),
        ..
    } = err
    {
        error["retryAfter"] = json!(seconds);
    }
    ToolReply::new(markdown, json!({ "error": error }))
}
