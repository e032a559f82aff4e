// src/hubspot/client.rs
// Typed calls to the CRM v3 API: list, search, schema, create, update

use std::collections::BTreeMap;

use futures::Stream;
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, ServerError};

use super::filters::FilterTerm;
use super::types::{
    EntityKind, ListPage, PropertyDescriptor, RawObject, RawPage, RawPropertiesResponse, Record,
};

/// Hard page-size ceiling imposed by the CRM.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default cap for full-table iteration.
pub const DEFAULT_MAX_ENTITIES: usize = 10_000;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody<'a> {
    filter_groups: Vec<FilterGroup<'a>>,
    limit: u32,
    properties: Vec<&'a str>,
}

#[derive(Serialize)]
struct FilterGroup<'a> {
    filters: &'a [FilterTerm],
}

#[derive(Serialize)]
struct WriteBody<'a> {
    properties: &'a BTreeMap<String, String>,
}

/// Stateless client over the shared HTTP connection pool. Every request
/// carries the bearer token; failures are classified, never retried here.
pub struct HubSpotClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HubSpotClient {
    pub fn new(http: reqwest::Client, base_url: String, api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(ServerError::config("HubSpot API key is empty"));
        }
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// The configured bearer token; also the cache partitioning component.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// One page from the cursor-paginated objects endpoint.
    pub async fn list(
        &self,
        kind: EntityKind,
        limit: u32,
        after: Option<&str>,
        properties: Option<&[String]>,
    ) -> Result<ListPage> {
        let limit = limit.min(MAX_PAGE_SIZE);
        let props: Vec<&str> = match properties {
            Some(list) => list.iter().map(String::as_str).collect(),
            None => kind.default_properties().to_vec(),
        };

        let mut request = self
            .http
            .get(self.url(&format!("/crm/v3/objects/{}", kind.object_path())))
            .bearer_auth(&self.api_key)
            .query(&[("limit", limit.to_string()), ("properties", props.join(","))]);
        if let Some(after) = after {
            request = request.query(&[("after", after)]);
        }

        let response = request.send().await?;
        let page: RawPage = Self::check(response, "list").await?.json().await?;
        Ok(ListPage {
            next_after: page.paging.and_then(|p| p.next).map(|n| n.after),
            records: page
                .results
                .into_iter()
                .map(|raw| raw.into_record(kind))
                .collect(),
        })
    }

    /// AND-of-terms search. An empty term list is valid and returns a
    /// plain page from the search endpoint.
    pub async fn search(
        &self,
        kind: EntityKind,
        terms: &[FilterTerm],
        limit: u32,
    ) -> Result<Vec<Record>> {
        let limit = limit.min(MAX_PAGE_SIZE);
        let body = SearchBody {
            filter_groups: if terms.is_empty() {
                Vec::new()
            } else {
                vec![FilterGroup { filters: terms }]
            },
            limit,
            properties: kind.default_properties().to_vec(),
        };

        let response = self
            .http
            .post(self.url(&format!("/crm/v3/objects/{}/search", kind.object_path())))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let page: RawPage = Self::check(response, "search").await?.json().await?;
        Ok(page
            .results
            .into_iter()
            .map(|raw| raw.into_record(kind))
            .collect())
    }

    /// Full property schema for a kind.
    pub async fn list_properties(&self, kind: EntityKind) -> Result<Vec<PropertyDescriptor>> {
        let response = self
            .http
            .get(self.url(&format!("/crm/v3/properties/{}", kind.object_path())))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let schema: RawPropertiesResponse =
            Self::check(response, "properties").await?.json().await?;
        Ok(schema.results)
    }

    pub async fn create_deal(&self, properties: &BTreeMap<String, String>) -> Result<Record> {
        let response = self
            .http
            .post(self.url("/crm/v3/objects/deals"))
            .bearer_auth(&self.api_key)
            .json(&WriteBody { properties })
            .send()
            .await?;
        let raw: RawObject = Self::check(response, "create deal").await?.json().await?;
        Ok(raw.into_record(EntityKind::Deal))
    }

    pub async fn update_deal(
        &self,
        deal_id: &str,
        properties: &BTreeMap<String, String>,
    ) -> Result<Record> {
        let response = self
            .http
            .patch(self.url(&format!("/crm/v3/objects/deals/{deal_id}")))
            .bearer_auth(&self.api_key)
            .json(&WriteBody { properties })
            .send()
            .await?;
        let raw: RawObject = Self::check(response, "update deal").await?.json().await?;
        Ok(raw.into_record(EntityKind::Deal))
    }

    /// Exact-name deal lookup: token search on `dealname`, then an exact
    /// post-filter. First exact match wins.
    pub async fn get_deal_by_name(&self, name: &str) -> Result<Option<Record>> {
        let terms = super::filters::terms_from_pairs([("dealname", Some(name))]);
        let candidates = self.search(EntityKind::Deal, &terms, MAX_PAGE_SIZE).await?;
        Ok(candidates
            .into_iter()
            .find(|record| record.prop("dealname") == Some(name)))
    }

    /// Follow pagination cursors, yielding up to `max_entities` records
    /// (0 means uncapped). Stops on a missing cursor or an empty batch.
    pub fn iterate_all<'a>(
        &'a self,
        kind: EntityKind,
        page_size: u32,
        max_entities: usize,
        properties: Option<&'a [String]>,
    ) -> impl Stream<Item = Result<Record>> + Send + 'a {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        async_stream::try_stream! {
            let mut after: Option<String> = None;
            let mut yielded = 0usize;
            loop {
                let page = self.list(kind, page_size, after.as_deref(), properties).await?;
                if page.records.is_empty() {
                    break;
                }
                for record in page.records {
                    yield record;
                    yielded += 1;
                    if max_entities != 0 && yielded >= max_entities {
                        return;
                    }
                }
                match page.next_after {
                    Some(cursor) => after = Some(cursor),
                    None => break,
                }
            }
            debug!(kind = %kind, yielded, "iteration exhausted");
        }
    }

    /// Collect `iterate_all` into a vector (index builds, bulk loads).
    pub async fn fetch_all(
        &self,
        kind: EntityKind,
        page_size: u32,
        max_entities: usize,
        properties: Option<&[String]>,
    ) -> Result<Vec<Record>> {
        use futures::TryStreamExt;
        let stream = self.iterate_all(kind, page_size, max_entities, properties);
        futures::pin_mut!(stream);
        stream.try_collect().await
    }

    /// Classify an error status for upper layers. Success passes through.
    async fn check(response: reqwest::Response, call: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();

        Err(match status.as_u16() {
            401 | 403 => ServerError::Auth(format!("CRM rejected credentials ({status})")),
            429 => ServerError::Transient {
                message: format!("CRM rate limit hit during {call}"),
                retry_after,
            },
            code if code >= 500 => ServerError::Transient {
                message: format!("CRM upstream failure during {call} ({status})"),
                retry_after: None,
            },
            _ => ServerError::Client(format!("CRM rejected {call} ({status}): {body}")),
        })
    }
}
