// src/tools/admin.rs
// Index, cache, and bulk-load administration executors

use futures::TryStreamExt;
use serde_json::json;

use crate::error::{Result, ServerError};
use crate::format::ToolReply;
use crate::hubspot::{DEFAULT_MAX_ENTITIES, EntityKind};
use crate::index::{DEFAULT_BUILD_LIMIT, IndexAlgorithm};
use crate::server::AppContext;

use super::requests::{
    BrowseIndexedRequest, LoadEntitiesRequest, ManageCacheRequest, ManageEmbeddingsRequest,
};
use super::parse_kinds;

pub async fn manage_embeddings(
    ctx: &AppContext,
    req: ManageEmbeddingsRequest,
) -> Result<ToolReply> {
    let kinds = match &req.entity_types {
        None => EntityKind::primary().to_vec(),
        types => parse_kinds(types)?,
    };

    match req.action.trim().to_ascii_lowercase().as_str() {
        "info" => {
            let stats = ctx.embeddings.stats().await;
            let mut markdown = format!(
                "🧠 **Embedding Indices** ({} records, model: {}, dimension: {})\n",
                stats.total_count, stats.model_name, stats.dimension
            );
            for (kind, entry) in &stats.per_kind {
                markdown.push_str(&format!(
                    "- {kind}: {} records, status {:?}\n",
                    entry.count, entry.status
                ));
            }
            Ok(ToolReply::new(markdown, serde_json::to_value(&stats)?))
        }
        "build" => {
            let algorithm = parse_algorithm(req.index_type.as_deref())?;
            let report = ctx
                .embeddings
                .build_from_crm(&ctx.hubspot, &kinds, DEFAULT_BUILD_LIMIT, algorithm)
                .await?;
            build_reply("Index Build", &report)
        }
        "rebuild" => {
            let report = ctx.embeddings.rebuild(&ctx.hubspot, &kinds).await?;
            build_reply("Index Rebuild", &report)
        }
        "clear" => {
            let cleared = ctx.embeddings.clear(&kinds).await?;
            let markdown = format!("🧹 **Indices Cleared**\n\n{cleared} indexed records removed.\n");
            Ok(ToolReply::new(markdown, json!({ "cleared": cleared })))
        }
        other => Err(ServerError::client(format!(
            "unknown action '{other}' (expected info, build, rebuild, or clear)"
        ))),
    }
}

fn build_reply(title: &str, report: &crate::index::BuildReport) -> Result<ToolReply> {
    let mut markdown = format!(
        "🧠 **{title}** ({}/{} entity types succeeded)\n",
        report.successful_entity_types(),
        report.outcomes.len()
    );
    for outcome in &report.outcomes {
        if outcome.success {
            markdown.push_str(&format!(
                "- {}: indexed {} of {} records ({})\n",
                outcome.entity_type, outcome.indexed, outcome.loaded, outcome.algorithm
            ));
        } else {
            markdown.push_str(&format!(
                "- {}: failed ({})\n",
                outcome.entity_type,
                outcome.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }
    Ok(ToolReply::new(markdown, serde_json::to_value(report)?))
}

fn parse_algorithm(index_type: Option<&str>) -> Result<IndexAlgorithm> {
    match index_type {
        None => Ok(IndexAlgorithm::Flat),
        Some(name) => IndexAlgorithm::parse(name).ok_or_else(|| {
            ServerError::client(format!(
                "unknown index_type '{name}' (expected flat or partitioned)"
            ))
        }),
    }
}

pub async fn browse_indexed(ctx: &AppContext, req: BrowseIndexedRequest) -> Result<ToolReply> {
    let kind = match &req.entity_type {
        Some(name) => Some(EntityKind::parse(name).ok_or_else(|| {
            ServerError::client(format!("unknown entity type '{name}'"))
        })?),
        None => None,
    };
    let offset = req.offset.unwrap_or(0) as usize;
    let limit = req.limit.unwrap_or(20).clamp(1, 100) as usize;
    let include_content = req.include_content.unwrap_or(false);

    match req.action.trim().to_ascii_lowercase().as_str() {
        "stats" => {
            let stats = ctx.embeddings.stats().await;
            let markdown = format!(
                "📇 **Indexed Data** ({} records across {} entity types, index: {})\n",
                stats.total_count,
                stats.per_kind.values().filter(|k| k.count > 0).count(),
                stats.index_kind
            );
            Ok(ToolReply::new(markdown, serde_json::to_value(&stats)?))
        }
        "list" => {
            let page = ctx
                .embeddings
                .browse(kind, offset, limit, None, include_content)
                .await?;
            browse_reply(page)
        }
        "search" => {
            let needle = req
                .search_text
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| ServerError::client("search_text is required for action=search"))?;
            let page = ctx
                .embeddings
                .browse(kind, offset, limit, Some(needle), include_content)
                .await?;
            browse_reply(page)
        }
        other => Err(ServerError::client(format!(
            "unknown action '{other}' (expected list, stats, or search)"
        ))),
    }
}

fn browse_reply(page: crate::index::BrowsePage) -> Result<ToolReply> {
    let mut markdown = format!(
        "📇 **Indexed Data** ({} matching, showing {} from offset {})\n",
        page.total,
        page.entries.len(),
        page.offset
    );
    for entry in &page.entries {
        markdown.push_str(&format!(
            "- {} `{}`: {}\n",
            entry.kind.label(),
            entry.id,
            entry.snippet
        ));
    }
    Ok(ToolReply::new(markdown, serde_json::to_value(&page)?))
}

pub async fn load_entities(ctx: &AppContext, req: LoadEntitiesRequest) -> Result<ToolReply> {
    let kind = EntityKind::parse(&req.entity_type).ok_or_else(|| {
        ServerError::client(format!("unknown entity type '{}'", req.entity_type))
    })?;
    // 0 means no cap
    let max_entities = req
        .max_entities
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_MAX_ENTITIES);

    // Full custom-property set, not the curated subset
    let descriptors = ctx.hubspot.list_properties(kind).await?;
    let property_names: Vec<String> = descriptors.iter().map(|d| d.name.clone()).collect();

    let stream = ctx
        .hubspot
        .iterate_all(kind, 100, max_entities, Some(&property_names));
    futures::pin_mut!(stream);

    let mut records = Vec::new();
    while let Some(record) = stream.try_next().await? {
        ctx.cache
            .put_full_record(kind, record.id.clone(), serde_json::to_value(&record)?)
            .await;
        records.push(record);
    }

    let build_embeddings = req.build_embeddings.unwrap_or(false);
    let outcome = if build_embeddings {
        Some(
            ctx.embeddings
                .build_from_records(kind, &records, IndexAlgorithm::Flat)
                .await?,
        )
    } else {
        None
    };

    let mut markdown = format!(
        "📦 **Bulk Load Complete**\n\n{} {} loaded with {} properties each.\n",
        records.len(),
        kind.plural_label().to_lowercase(),
        property_names.len()
    );
    if let Some(outcome) = &outcome {
        markdown.push_str(&format!(
            "Embedding index rebuilt: {} records indexed ({}).\n",
            outcome.indexed, outcome.algorithm
        ));
    }
    Ok(ToolReply::new(
        markdown,
        json!({
            "entityType": kind.object_path(),
            "loaded": records.len(),
            "propertyCount": property_names.len(),
            "buildOutcome": outcome,
        }),
    ))
}

pub async fn manage_cache(ctx: &AppContext, req: ManageCacheRequest) -> Result<ToolReply> {
    match req.action.trim().to_ascii_lowercase().as_str() {
        "info" => {
            let info = ctx.cache.info().await;
            let markdown = format!(
                "ℹ️ **Cache** ({} entries + {} full records, capacity {}, TTL {}s)\n",
                info.size, info.full_records, info.capacity, info.ttl_seconds
            );
            Ok(ToolReply::new(markdown, serde_json::to_value(&info)?))
        }
        "clear" => {
            let report = ctx.cache.clear().await;
            let markdown = format!(
                "🧹 **Cache Cleared**\n\n{} entries removed (capacity {}, TTL {}s).\n",
                report.cleared, report.capacity, report.ttl_seconds
            );
            Ok(ToolReply::new(markdown, serde_json::to_value(&report)?))
        }
        other => Err(ServerError::client(format!(
            "unknown action '{other}' (expected info or clear)"
        ))),
    }
}
