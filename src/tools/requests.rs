// src/tools/requests.rs
// Request types for the tool surface; schemars derives the JSON Schemas

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, ServerError};

/// Tools that accept no arguments still validate an (empty) object.
#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct EmptyRequest {}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListRequest {
    #[schemars(description = "Page size, 1-100 (values above 100 are clamped)")]
    pub limit: Option<u32>,
    #[schemars(description = "Pagination cursor returned by a previous page")]
    pub after: Option<String>,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct ContactFilters {
    #[schemars(description = "Email address (token match)")]
    pub email: Option<String>,
    #[schemars(description = "First name (token match)")]
    pub firstname: Option<String>,
    #[schemars(description = "Last name (token match)")]
    pub lastname: Option<String>,
    #[schemars(description = "Company name (token match)")]
    pub company: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchContactsRequest {
    #[schemars(description = "Max results, 1-100")]
    pub limit: Option<u32>,
    pub filters: Option<ContactFilters>,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct CompanyFilters {
    #[schemars(description = "Company name (token match)")]
    pub name: Option<String>,
    #[schemars(description = "Web domain (token match)")]
    pub domain: Option<String>,
    #[schemars(description = "Industry (token match)")]
    pub industry: Option<String>,
    #[schemars(description = "Country (token match)")]
    pub country: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchCompaniesRequest {
    #[schemars(description = "Max results, 1-100")]
    pub limit: Option<u32>,
    pub filters: Option<CompanyFilters>,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct DealFilters {
    #[schemars(description = "Deal name (token match)")]
    pub dealname: Option<String>,
    #[schemars(description = "Owner ID (exact match)")]
    pub owner_id: Option<String>,
    #[schemars(description = "Deal stage (exact match)")]
    pub dealstage: Option<String>,
    #[schemars(description = "Pipeline (exact match)")]
    pub pipeline: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchDealsRequest {
    #[schemars(description = "Max results, 1-100")]
    pub limit: Option<u32>,
    pub filters: Option<DealFilters>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetDealByNameRequest {
    #[schemars(description = "Exact deal name to look up")]
    pub deal_name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateDealRequest {
    #[schemars(description = "Deal name")]
    pub dealname: String,
    #[schemars(description = "Deal amount")]
    pub amount: Option<f64>,
    #[schemars(description = "Deal stage")]
    pub dealstage: Option<String>,
    #[schemars(description = "Pipeline")]
    pub pipeline: Option<String>,
    #[schemars(description = "Close date (YYYY-MM-DD)")]
    pub closedate: Option<String>,
    #[schemars(description = "Owner ID")]
    pub hubspot_owner_id: Option<String>,
    #[schemars(description = "Description")]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateDealRequest {
    #[schemars(description = "ID of the deal to update")]
    pub deal_id: String,
    #[schemars(description = "Property name to new value; at least one entry required")]
    pub properties: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SemanticSearchRequest {
    #[schemars(description = "Natural-language query")]
    pub query: String,
    #[schemars(
        description = "Entity types to search (contacts/companies/deals/engagements); all by default"
    )]
    pub entity_types: Option<Vec<String>>,
    #[schemars(description = "Max results, 1-100 (default 10)")]
    pub limit: Option<u32>,
    #[schemars(
        description = "semantic (vector only), hybrid (vector + structured API search), or auto (default: semantic when an index is ready, else hybrid)"
    )]
    pub search_mode: Option<String>,
    #[schemars(description = "Weight of the vector score in hybrid mode, 0.0-1.0 (default 0.7)")]
    pub semantic_weight: Option<f32>,
    #[schemars(description = "Minimum similarity score, -1.0-1.0 (default 0.5)")]
    pub threshold: Option<f32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ManageEmbeddingsRequest {
    #[schemars(description = "info, build, rebuild, or clear")]
    pub action: String,
    #[schemars(
        description = "Entity types to operate on; contacts/companies/deals by default"
    )]
    pub entity_types: Option<Vec<String>>,
    #[schemars(description = "flat (exhaustive) or partitioned (approximate, for large sets)")]
    pub index_type: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct BrowseIndexedRequest {
    #[schemars(description = "list, stats, or search")]
    pub action: String,
    #[schemars(description = "Restrict to one entity type")]
    pub entity_type: Option<String>,
    #[schemars(description = "Page offset (default 0)")]
    pub offset: Option<u32>,
    #[schemars(description = "Page size, 1-100 (default 20)")]
    pub limit: Option<u32>,
    #[schemars(description = "Substring filter for action=search (case-insensitive)")]
    pub search_text: Option<String>,
    #[schemars(description = "Include the full indexed text of each entry")]
    pub include_content: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LoadEntitiesRequest {
    #[schemars(description = "Entity type to load (contacts/companies/deals/engagements)")]
    pub entity_type: String,
    #[schemars(description = "Also (re)build the embedding index from the loaded records")]
    pub build_embeddings: Option<bool>,
    #[schemars(description = "Cap on loaded entities; 0 means no cap (default 10000)")]
    pub max_entities: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ManageCacheRequest {
    #[schemars(description = "info or clear")]
    pub action: String,
}

/// Clamp a page limit: values above 100 are reduced, below 1 rejected.
pub fn clamp_limit(limit: Option<u32>, default: u32) -> Result<u32> {
    match limit {
        None => Ok(default),
        Some(0) => Err(ServerError::client("limit must be at least 1")),
        Some(n) => Ok(n.min(100)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit_bounds() {
        assert_eq!(clamp_limit(None, 10).unwrap(), 10);
        assert_eq!(clamp_limit(Some(5), 10).unwrap(), 5);
        assert_eq!(clamp_limit(Some(100), 10).unwrap(), 100);
        assert_eq!(clamp_limit(Some(250), 10).unwrap(), 100);
        assert!(clamp_limit(Some(0), 10).is_err());
    }

    #[test]
    fn test_schema_generation_has_properties() {
        let schema = serde_json::to_value(schemars::schema_for!(SemanticSearchRequest)).unwrap();
        let properties = schema.get("properties").expect("object schema");
        assert!(properties.get("query").is_some());
        assert!(properties.get("search_mode").is_some());
    }

    #[test]
    fn test_update_request_accepts_arbitrary_property_map() {
        let req: UpdateDealRequest = serde_json::from_value(serde_json::json!({
            "deal_id": "42",
            "properties": {"amount": 1000, "dealstage": "closedwon"}
        }))
        .unwrap();
        assert_eq!(req.properties.len(), 2);
    }
}
