// src/tools/properties.rs
// Property schema executors

use serde_json::json;

use crate::error::Result;
use crate::format::{self, ToolReply};
use crate::hubspot::EntityKind;
use crate::server::AppContext;

pub async fn get_properties(ctx: &AppContext, kind: EntityKind) -> Result<ToolReply> {
    let descriptors = ctx.hubspot.list_properties(kind).await?;
    let markdown = format::render_properties(kind, &descriptors);
    Ok(ToolReply::new(markdown, json!({ "results": descriptors })))
}
