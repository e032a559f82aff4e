// src/tools/search.rs
// Structured search executors and the exact-name deal lookup

use serde_json::json;

use crate::error::{Result, ServerError};
use crate::format::{self, ToolReply};
use crate::hubspot::{EntityKind, FilterTerm, terms_from_pairs};
use crate::server::AppContext;

use super::requests::{
    SearchCompaniesRequest, SearchContactsRequest, SearchDealsRequest, GetDealByNameRequest,
    clamp_limit,
};

pub async fn search_contacts(ctx: &AppContext, req: SearchContactsRequest) -> Result<ToolReply> {
    let limit = clamp_limit(req.limit, 10)?;
    let filters = req.filters.unwrap_or_default();
    let terms = terms_from_pairs([
        ("email", filters.email.as_deref()),
        ("firstname", filters.firstname.as_deref()),
        ("lastname", filters.lastname.as_deref()),
        ("company", filters.company.as_deref()),
    ]);
    run_search(ctx, EntityKind::Contact, terms, limit).await
}

pub async fn search_companies(ctx: &AppContext, req: SearchCompaniesRequest) -> Result<ToolReply> {
    let limit = clamp_limit(req.limit, 10)?;
    let filters = req.filters.unwrap_or_default();
    let terms = terms_from_pairs([
        ("name", filters.name.as_deref()),
        ("domain", filters.domain.as_deref()),
        ("industry", filters.industry.as_deref()),
        ("country", filters.country.as_deref()),
    ]);
    run_search(ctx, EntityKind::Company, terms, limit).await
}

pub async fn search_deals(ctx: &AppContext, req: SearchDealsRequest) -> Result<ToolReply> {
    let limit = clamp_limit(req.limit, 10)?;
    let filters = req.filters.unwrap_or_default();
    let terms = terms_from_pairs([
        ("dealname", filters.dealname.as_deref()),
        ("owner_id", filters.owner_id.as_deref()),
        ("dealstage", filters.dealstage.as_deref()),
        ("pipeline", filters.pipeline.as_deref()),
    ]);
    run_search(ctx, EntityKind::Deal, terms, limit).await
}

async fn run_search(
    ctx: &AppContext,
    kind: EntityKind,
    terms: Vec<FilterTerm>,
    limit: u32,
) -> Result<ToolReply> {
    let records = ctx.hubspot.search(kind, &terms, limit).await?;
    let markdown = format::render_list(kind, &records);
    Ok(ToolReply::new(markdown, json!({ "results": records })))
}

pub async fn get_deal_by_name(ctx: &AppContext, req: GetDealByNameRequest) -> Result<ToolReply> {
    match ctx.hubspot.get_deal_by_name(&req.deal_name).await? {
        Some(deal) => {
            let markdown = format!("💼 **Deal**\n\n{}", format::render_record(&deal));
            Ok(ToolReply::new(markdown, json!({ "result": deal })))
        }
        None => Err(ServerError::NotFound {
            what: "Deal".into(),
            reason: format!("No deal with exact name '{}'.", req.deal_name),
        }),
    }
}
