// src/tools/semantic.rs
// Meaning-based search over the vector indices, with hybrid and auto modes

use serde_json::json;

use crate::error::{Result, ServerError};
use crate::format::ToolReply;
use crate::hubspot::EntityKind;
use crate::index::{
    HybridHit, SearchHit, api_terms_for_kind, extract_query_terms, merge_hybrid,
};
use crate::server::AppContext;

use super::requests::{SemanticSearchRequest, clamp_limit};
use super::parse_kinds;

const DEFAULT_SEMANTIC_WEIGHT: f32 = 0.7;
const DEFAULT_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchMode {
    Semantic,
    Hybrid,
    Auto,
}

impl SearchMode {
    fn parse(s: Option<&str>) -> Result<SearchMode> {
        match s.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("auto") => Ok(SearchMode::Auto),
            Some("semantic") => Ok(SearchMode::Semantic),
            Some("hybrid") => Ok(SearchMode::Hybrid),
            Some(other) => Err(ServerError::client(format!(
                "unknown search_mode '{other}' (expected semantic, hybrid, or auto)"
            ))),
        }
    }
}

pub async fn semantic_search(ctx: &AppContext, req: SemanticSearchRequest) -> Result<ToolReply> {
    if !ctx.embeddings.enabled() {
        return Err(ServerError::Disabled("embeddings".into()));
    }
    if req.query.trim().is_empty() {
        return Err(ServerError::client("query must not be empty"));
    }

    let kinds = parse_kinds(&req.entity_types)?;
    let limit = clamp_limit(req.limit, 10)? as usize;
    let mode = SearchMode::parse(req.search_mode.as_deref())?;
    let weight = req
        .semantic_weight
        .unwrap_or(DEFAULT_SEMANTIC_WEIGHT)
        .clamp(0.0, 1.0);
    let threshold = req.threshold.unwrap_or(DEFAULT_THRESHOLD);

    match mode {
        SearchMode::Semantic => {
            let hits = ctx
                .embeddings
                .search(&req.query, &kinds, limit, threshold)
                .await?;
            Ok(semantic_reply(&req.query, "semantic", hits))
        }
        SearchMode::Hybrid => {
            let hits = run_hybrid(ctx, &req.query, &kinds, limit, weight, threshold).await?;
            Ok(hybrid_reply(&req.query, "hybrid", hits))
        }
        SearchMode::Auto => {
            let ready = ctx.embeddings.ready_kinds(&kinds).await;
            if !ready.is_empty() {
                // partially ready: search the ready kinds, skip the rest
                let hits = ctx
                    .embeddings
                    .search(&req.query, &ready, limit, threshold)
                    .await?;
                return Ok(semantic_reply(&req.query, "auto (semantic)", hits));
            }
            let terms = extract_query_terms(&req.query);
            let has_api_side = kinds
                .iter()
                .any(|kind| !api_terms_for_kind(*kind, &terms).is_empty());
            if has_api_side {
                let hits = run_hybrid(ctx, &req.query, &kinds, limit, weight, threshold).await?;
                return Ok(hybrid_reply(&req.query, "auto (hybrid)", hits));
            }
            Err(ServerError::client(
                "no search strategy available: no index is ready and the query yields no structured predicate (build an index with manage_hubspot_embeddings first)",
            ))
        }
    }
}

/// Vector side (tolerating not-ready) plus structured API side, merged by
/// weighted score.
async fn run_hybrid(
    ctx: &AppContext,
    query: &str,
    kinds: &[EntityKind],
    limit: usize,
    weight: f32,
    threshold: f32,
) -> Result<Vec<HybridHit>> {
    let semantic = match ctx.embeddings.search(query, kinds, limit, threshold).await {
        Ok(hits) => hits,
        Err(ServerError::NotReady(_)) => Vec::new(),
        Err(other) => return Err(other),
    };

    let terms = extract_query_terms(query);
    let mut api_records = Vec::new();
    if !terms.is_empty() {
        let mut ordered = kinds.to_vec();
        ordered.sort();
        ordered.dedup();
        for kind in ordered {
            let filters = api_terms_for_kind(kind, &terms);
            if filters.is_empty() {
                continue;
            }
            api_records.extend(ctx.hubspot.search(kind, &filters, limit as u32).await?);
        }
    }

    Ok(merge_hybrid(semantic, api_records, weight, limit))
}

fn semantic_reply(query: &str, mode: &str, hits: Vec<SearchHit>) -> ToolReply {
    let mut markdown = format!(
        "🔎 **Semantic Search** ({} results, mode: {mode})\n",
        hits.len()
    );
    for (rank, hit) in hits.iter().enumerate() {
        markdown.push_str(&format!(
            "\n{}. {} {} `{}` (score {:.2})\n   {}\n",
            rank + 1,
            hit.kind.emoji(),
            hit.kind.label(),
            hit.id,
            hit.score,
            hit.snippet
        ));
    }
    ToolReply::new(
        markdown,
        json!({ "query": query, "mode": mode, "results": hits }),
    )
}

fn hybrid_reply(query: &str, mode: &str, hits: Vec<HybridHit>) -> ToolReply {
    let mut markdown = format!(
        "🔎 **Semantic Search** ({} results, mode: {mode})\n",
        hits.len()
    );
    for (rank, hit) in hits.iter().enumerate() {
        markdown.push_str(&format!(
            "\n{}. {} {} `{}` (score {:.2}, {})\n   {}\n",
            rank + 1,
            hit.kind.emoji(),
            hit.kind.label(),
            hit.id,
            hit.score,
            hit.source,
            hit.snippet
        ));
    }
    ToolReply::new(
        markdown,
        json!({ "query": query, "mode": mode, "results": hits }),
    )
}
