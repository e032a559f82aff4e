// src/tools/listing.rs
// One-page list executors

use serde_json::json;

use crate::error::Result;
use crate::format::{self, ToolReply};
use crate::hubspot::EntityKind;
use crate::server::AppContext;

use super::requests::{ListRequest, clamp_limit};

pub async fn list_entities(
    ctx: &AppContext,
    kind: EntityKind,
    req: ListRequest,
) -> Result<ToolReply> {
    let limit = clamp_limit(req.limit, 10)?;
    let page = ctx
        .hubspot
        .list(kind, limit, req.after.as_deref(), None)
        .await?;

    let mut markdown = format::render_list(kind, &page.records);
    if let Some(after) = &page.next_after {
        markdown.push_str(&format!("\nNext page cursor: `{after}`\n"));
    }
    let raw = json!({
        "results": page.records,
        "nextAfter": page.next_after,
    });
    Ok(ToolReply::new(markdown, raw))
}
