// src/tools/deals.rs
// Deal write executors

use std::collections::{BTreeMap, HashSet};

use serde_json::{Value, json};

use crate::error::{Result, ServerError};
use crate::format::{self, ToolReply};
use crate::hubspot::EntityKind;
use crate::server::AppContext;

use super::requests::{CreateDealRequest, UpdateDealRequest};

pub async fn create_deal(ctx: &AppContext, req: CreateDealRequest) -> Result<ToolReply> {
    if req.dealname.trim().is_empty() {
        return Err(ServerError::client("dealname must not be empty"));
    }

    let mut properties = BTreeMap::new();
    properties.insert("dealname".to_string(), req.dealname);
    if let Some(amount) = req.amount {
        properties.insert("amount".to_string(), render_number(amount));
    }
    for (name, value) in [
        ("dealstage", req.dealstage),
        ("pipeline", req.pipeline),
        ("closedate", req.closedate),
        ("hubspot_owner_id", req.hubspot_owner_id),
        ("description", req.description),
    ] {
        if let Some(value) = value {
            properties.insert(name.to_string(), value);
        }
    }

    let deal = ctx.hubspot.create_deal(&properties).await?;
    let markdown = format!("✅ **Deal Created**\n\n{}", format::render_record(&deal));
    Ok(ToolReply::new(markdown, json!({ "result": deal })))
}

pub async fn update_deal(ctx: &AppContext, req: UpdateDealRequest) -> Result<ToolReply> {
    if req.properties.is_empty() {
        return Err(ServerError::client("at least one property required"));
    }

    // Validate property names against the live deal schema
    let schema = ctx.hubspot.list_properties(EntityKind::Deal).await?;
    let known: HashSet<&str> = schema.iter().map(|d| d.name.as_str()).collect();

    let mut properties = BTreeMap::new();
    for (name, value) in &req.properties {
        if !known.contains(name.as_str()) {
            return Err(ServerError::client(format!(
                "unknown deal property '{name}'"
            )));
        }
        let rendered = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => {
                return Err(ServerError::client(format!(
                    "property '{name}' must be a string, number, or boolean"
                )));
            }
        };
        properties.insert(name.clone(), rendered);
    }

    let deal = ctx.hubspot.update_deal(&req.deal_id, &properties).await?;
    let markdown = format!("✅ **Deal Updated**\n\n{}", format::render_record(&deal));
    Ok(ToolReply::new(markdown, json!({ "result": deal })))
}

/// Integral amounts serialize without a trailing `.0`.
fn render_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
