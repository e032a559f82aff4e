// src/index/manager.rs
// Per-kind index lifecycle: build, rebuild, clear, query, browse, stats

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::embeddings::EmbeddingClient;
use crate::error::{Result, ServerError};
use crate::hubspot::{EntityKind, HubSpotClient, Record};

use super::text::serialize_record;
use super::{IndexAlgorithm, PARTITION_AUTO_THRESHOLD, VectorIndex};

/// Default per-kind record cap for a build.
pub const DEFAULT_BUILD_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStatus {
    Empty,
    Building,
    Ready,
}

/// Sidecar row: resolves a matrix position back to the record it came from.
pub(crate) struct IndexedText {
    pub id: String,
    pub text: String,
}

/// One committed index generation for a kind. Readers clone the Arc and
/// keep searching their snapshot while a rebuild prepares the next one.
struct KindState {
    index: VectorIndex,
    records: Vec<IndexedText>,
    built_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct BuildConfig {
    limit: usize,
    algorithm: IndexAlgorithm,
}

struct KindSlot {
    snapshot: RwLock<Option<Arc<KindState>>>,
    building: AtomicBool,
    config: Mutex<BuildConfig>,
}

impl KindSlot {
    fn new() -> Self {
        Self {
            snapshot: RwLock::new(None),
            building: AtomicBool::new(false),
            config: Mutex::new(BuildConfig {
                limit: DEFAULT_BUILD_LIMIT,
                algorithm: IndexAlgorithm::Flat,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOutcome {
    pub entity_type: String,
    pub loaded: usize,
    pub indexed: usize,
    pub algorithm: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-kind outcomes of one build run. A failed kind never poisons the
/// others.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub outcomes: Vec<BuildOutcome>,
}

impl BuildReport {
    pub fn successful_entity_types(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn total_entities_loaded(&self) -> usize {
        self.outcomes.iter().map(|o| o.loaded).sum()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: String,
    pub kind: EntityKind,
    pub score: f32,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseEntry {
    pub id: String,
    pub kind: EntityKind,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowsePage {
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub entries: Vec<BrowseEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindStats {
    pub count: usize,
    pub status: IndexStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub built_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub per_kind: BTreeMap<String, KindStats>,
    pub total_count: usize,
    pub dimension: usize,
    pub index_kind: String,
    pub model_name: String,
    pub status: String,
}

/// Owns the per-kind vector indices and their textual sidecars. All state
/// is process-local; nothing survives a restart.
pub struct EmbeddingManager {
    enabled: bool,
    embedder: EmbeddingClient,
    slots: HashMap<EntityKind, KindSlot>,
}

impl EmbeddingManager {
    pub fn new(embedder: EmbeddingClient, enabled: bool) -> Self {
        let slots = EntityKind::all()
            .into_iter()
            .map(|kind| (kind, KindSlot::new()))
            .collect();
        Self {
            enabled,
            embedder,
            slots,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    fn ensure_enabled(&self) -> Result<()> {
        if self.enabled {
            Ok(())
        } else {
            Err(ServerError::Disabled("embeddings".into()))
        }
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    fn slot(&self, kind: EntityKind) -> &KindSlot {
        // all four kinds are inserted at construction
        self.slots.get(&kind).expect("slot exists for every kind")
    }

    pub async fn status(&self, kind: EntityKind) -> IndexStatus {
        let slot = self.slot(kind);
        if slot.snapshot.read().await.is_some() {
            IndexStatus::Ready
        } else if slot.building.load(Ordering::Acquire) {
            IndexStatus::Building
        } else {
            IndexStatus::Empty
        }
    }

    /// Requested kinds whose index is currently serving.
    pub async fn ready_kinds(&self, requested: &[EntityKind]) -> Vec<EntityKind> {
        let mut ready = Vec::new();
        for kind in requested {
            if self.status(*kind).await == IndexStatus::Ready {
                ready.push(*kind);
            }
        }
        ready
    }

    pub async fn any_ready(&self) -> bool {
        !self.ready_kinds(&EntityKind::all()).await.is_empty()
    }

    /// Pull records from the CRM and (re)index each requested kind.
    pub async fn build_from_crm(
        &self,
        client: &HubSpotClient,
        kinds: &[EntityKind],
        limit: usize,
        algorithm: IndexAlgorithm,
    ) -> Result<BuildReport> {
        self.ensure_enabled()?;
        let mut outcomes = Vec::new();
        for kind in kinds {
            let outcome = match client.fetch_all(*kind, 100, limit, None).await {
                Ok(records) => self
                    .index_records(*kind, &records, limit, algorithm)
                    .await
                    .unwrap_or_else(|err| failed_outcome(*kind, algorithm, err)),
                Err(err) => failed_outcome(*kind, algorithm, err),
            };
            outcomes.push(outcome);
        }
        Ok(BuildReport { outcomes })
    }

    /// Index records the caller already fetched (bulk cache load path).
    pub async fn build_from_records(
        &self,
        kind: EntityKind,
        records: &[Record],
        algorithm: IndexAlgorithm,
    ) -> Result<BuildOutcome> {
        self.ensure_enabled()?;
        self.index_records(kind, records, records.len().max(DEFAULT_BUILD_LIMIT), algorithm)
            .await
    }

    /// Clear each kind, then build it again with its previous settings.
    pub async fn rebuild(
        &self,
        client: &HubSpotClient,
        kinds: &[EntityKind],
    ) -> Result<BuildReport> {
        self.ensure_enabled()?;
        let mut outcomes = Vec::new();
        for kind in kinds {
            let config = *self.slot(*kind).config.lock().expect("config lock");
            self.clear(std::slice::from_ref(kind)).await?;
            let report = self
                .build_from_crm(client, std::slice::from_ref(kind), config.limit, config.algorithm)
                .await?;
            outcomes.extend(report.outcomes);
        }
        Ok(BuildReport { outcomes })
    }

    /// Drop indices; returns how many indexed records were discarded.
    pub async fn clear(&self, kinds: &[EntityKind]) -> Result<usize> {
        self.ensure_enabled()?;
        let mut cleared = 0;
        for kind in kinds {
            let mut guard = self.slot(*kind).snapshot.write().await;
            if let Some(state) = guard.take() {
                cleared += state.records.len();
            }
        }
        Ok(cleared)
    }

    /// Vector search across the requested kinds. Kinds that are not ready
    /// are skipped; when none are ready the query fails with NotReady.
    pub async fn search(
        &self,
        query: &str,
        kinds: &[EntityKind],
        k: usize,
        min_score: f32,
    ) -> Result<Vec<SearchHit>> {
        self.ensure_enabled()?;
        let ready = self.ready_kinds(kinds).await;
        if ready.is_empty() {
            let requested: Vec<&str> = kinds.iter().map(|k| k.object_path()).collect();
            return Err(ServerError::NotReady(format!(
                "no index is ready for: {} (run manage_hubspot_embeddings with action=build first)",
                requested.join(", ")
            )));
        }

        let query_vector = self.embedder.embed(query).await?;
        let mut hits = Vec::new();
        for kind in ready {
            let snapshot = self.slot(kind).snapshot.read().await.clone();
            let Some(state) = snapshot else { continue };
            for (position, score) in state.index.search(&query_vector, k) {
                if score < min_score {
                    continue;
                }
                let row = &state.records[position];
                hits.push(SearchHit {
                    id: row.id.clone(),
                    kind,
                    score,
                    snippet: snippet_prefix(&row.text, 160),
                });
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.kind.cmp(&b.kind))
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Offset/limit page over the indexed records, optionally filtered by a
    /// case-insensitive substring with a ±40-char snippet around the match.
    pub async fn browse(
        &self,
        kind: Option<EntityKind>,
        offset: usize,
        limit: usize,
        text_filter: Option<&str>,
        include_content: bool,
    ) -> Result<BrowsePage> {
        self.ensure_enabled()?;
        let kinds: Vec<EntityKind> = match kind {
            Some(kind) => vec![kind],
            None => EntityKind::all().to_vec(),
        };

        let mut entries = Vec::new();
        for kind in kinds {
            let snapshot = self.slot(kind).snapshot.read().await.clone();
            let Some(state) = snapshot else { continue };
            for row in &state.records {
                let snippet = match text_filter {
                    Some(filter) => match snippet_around_match(&row.text, filter) {
                        Some(snippet) => snippet,
                        None => continue,
                    },
                    None => snippet_prefix(&row.text, 80),
                };
                entries.push(BrowseEntry {
                    id: row.id.clone(),
                    kind,
                    snippet,
                    text: include_content.then(|| row.text.clone()),
                });
            }
        }

        let total = entries.len();
        let page: Vec<BrowseEntry> = entries.into_iter().skip(offset).take(limit).collect();
        Ok(BrowsePage {
            total,
            offset,
            limit,
            entries: page,
        })
    }

    pub async fn stats(&self) -> IndexStats {
        let mut per_kind = BTreeMap::new();
        let mut total = 0;
        let mut index_kind = IndexAlgorithm::Flat;
        let mut any_ready = false;
        for kind in EntityKind::all() {
            let status = self.status(kind).await;
            let snapshot = self.slot(kind).snapshot.read().await.clone();
            let (count, built_at) = match &snapshot {
                Some(state) => {
                    index_kind = state.index.algorithm();
                    (state.records.len(), Some(state.built_at))
                }
                None => (0, None),
            };
            if status == IndexStatus::Ready {
                any_ready = true;
            }
            total += count;
            per_kind.insert(
                kind.object_path().to_string(),
                KindStats {
                    count,
                    status,
                    built_at,
                },
            );
        }
        IndexStats {
            per_kind,
            total_count: total,
            dimension: self.dimension(),
            index_kind: index_kind.name().to_string(),
            model_name: self.model_name().to_string(),
            status: if any_ready { "ready".into() } else { "empty".into() },
        }
    }

    /// Embed + build + swap. The status dance: a first build flags the
    /// kind as building (queries fail NotReady); re-indexing over a live
    /// index keeps serving the old snapshot until the swap.
    async fn index_records(
        &self,
        kind: EntityKind,
        records: &[Record],
        limit: usize,
        algorithm: IndexAlgorithm,
    ) -> Result<BuildOutcome> {
        let slot = self.slot(kind);
        slot.building.store(true, Ordering::Release);
        let result = self
            .index_records_inner(kind, records, algorithm)
            .await;
        slot.building.store(false, Ordering::Release);

        if result.is_ok() {
            *slot.config.lock().expect("config lock") = BuildConfig { limit, algorithm };
        }
        result
    }

    async fn index_records_inner(
        &self,
        kind: EntityKind,
        records: &[Record],
        algorithm: IndexAlgorithm,
    ) -> Result<BuildOutcome> {
        let mut sidecar = Vec::new();
        let mut texts = Vec::new();
        for record in records {
            let text = serialize_record(record);
            if text.is_empty() {
                continue;
            }
            sidecar.push(IndexedText {
                id: record.id.clone(),
                text: text.clone(),
            });
            texts.push(text);
        }

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.embedder.batch_size().max(1)) {
            vectors.extend(self.embedder.embed_batch(batch).await?);
        }

        let effective = if algorithm == IndexAlgorithm::Flat
            && vectors.len() >= PARTITION_AUTO_THRESHOLD
        {
            IndexAlgorithm::Partitioned
        } else {
            algorithm
        };

        let index = VectorIndex::build(vectors, self.embedder.dimension(), effective);
        let indexed = index.len();
        let state = Arc::new(KindState {
            index,
            records: sidecar,
            built_at: Utc::now(),
        });
        *self.slot(kind).snapshot.write().await = Some(state);

        info!(kind = %kind, loaded = records.len(), indexed, algorithm = effective.name(), "index built");
        Ok(BuildOutcome {
            entity_type: kind.object_path().to_string(),
            loaded: records.len(),
            indexed,
            algorithm: effective.name().to_string(),
            success: true,
            error: None,
        })
    }
}

fn failed_outcome(kind: EntityKind, algorithm: IndexAlgorithm, err: ServerError) -> BuildOutcome {
    warn!(kind = %kind, error = %err, "index build failed");
    BuildOutcome {
        entity_type: kind.object_path().to_string(),
        loaded: 0,
        indexed: 0,
        algorithm: algorithm.name().to_string(),
        success: false,
        error: Some(err.to_string()),
    }
}

/// First `max` characters, newlines flattened for one-line display.
fn snippet_prefix(text: &str, max: usize) -> String {
    let mut snippet: String = text.chars().take(max).collect();
    if text.chars().count() > max {
        snippet.push('…');
    }
    snippet.replace('\n', "; ")
}

/// ±40 characters around the first case-insensitive match, or None.
fn snippet_around_match(text: &str, filter: &str) -> Option<String> {
    if filter.is_empty() {
        return Some(snippet_prefix(text, 80));
    }
    let haystack: Vec<char> = text.chars().collect();
    let lowered: Vec<char> = haystack
        .iter()
        .map(|c| c.to_lowercase().next().unwrap_or(*c))
        .collect();
    let needle: Vec<char> = filter
        .chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect();
    if needle.is_empty() || needle.len() > lowered.len() {
        return None;
    }

    let position = lowered
        .windows(needle.len())
        .position(|window| window == needle.as_slice())?;

    let start = position.saturating_sub(40);
    let end = (position + needle.len() + 40).min(haystack.len());
    let mut snippet: String = haystack[start..end].iter().collect();
    if start > 0 {
        snippet = format!("…{snippet}");
    }
    if end < haystack.len() {
        snippet.push('…');
    }
    Some(snippet.replace('\n', "; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn deal(id: &str, name: &str) -> Record {
        Record {
            id: id.into(),
            kind: EntityKind::Deal,
            properties: BTreeMap::from([("dealname".to_string(), Some(name.to_string()))]),
            created_at: None,
            updated_at: None,
        }
    }

    fn manager() -> EmbeddingManager {
        EmbeddingManager::new(EmbeddingClient::local(), true)
    }

    #[tokio::test]
    async fn test_build_search_ranks_semantically_close_deal_first() {
        let manager = manager();
        let records = vec![deal("1", "Enterprise Renewal"), deal("2", "SMB Trial")];
        let outcome = manager
            .build_from_records(EntityKind::Deal, &records, IndexAlgorithm::Flat)
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.indexed, 2);

        let hits = manager
            .search("enterprise contract", &[EntityKind::Deal], 5, 0.0)
            .await
            .unwrap();
        assert_eq!(hits[0].id, "1");
        assert!(hits[0].score > hits.get(1).map(|h| h.score).unwrap_or(0.0));
        assert!(hits[0].score > 0.3);
    }

    #[tokio::test]
    async fn test_search_unbuilt_kind_is_not_ready() {
        let manager = manager();
        let err = manager
            .search("anything", &[EntityKind::Contact], 5, 0.0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_ready");
    }

    #[tokio::test]
    async fn test_disabled_manager_rejects_everything() {
        let manager = EmbeddingManager::new(EmbeddingClient::local(), false);
        let err = manager
            .search("q", &[EntityKind::Deal], 5, 0.0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "disabled");
        assert_eq!(
            manager.clear(&[EntityKind::Deal]).await.unwrap_err().kind(),
            "disabled"
        );
    }

    #[tokio::test]
    async fn test_clear_then_stats_reports_empty() {
        let manager = manager();
        manager
            .build_from_records(EntityKind::Deal, &[deal("1", "A"), deal("2", "B")], IndexAlgorithm::Flat)
            .await
            .unwrap();

        let cleared = manager.clear(&[EntityKind::Deal]).await.unwrap();
        assert_eq!(cleared, 2);

        let stats = manager.stats().await;
        assert_eq!(stats.total_count, 0);
        let deal_stats = &stats.per_kind["deals"];
        assert_eq!(deal_stats.status, IndexStatus::Empty);
        assert!(deal_stats.built_at.is_none());
    }

    #[tokio::test]
    async fn test_cross_kind_merge_breaks_ties_by_kind_order() {
        let manager = manager();
        let contact = Record {
            id: "c1".into(),
            kind: EntityKind::Contact,
            properties: BTreeMap::from([("firstname".to_string(), Some("Acme".to_string()))]),
            created_at: None,
            updated_at: None,
        };
        let company = Record {
            id: "k1".into(),
            kind: EntityKind::Company,
            properties: BTreeMap::from([("name".to_string(), Some("Acme".to_string()))]),
            created_at: None,
            updated_at: None,
        };
        manager
            .build_from_records(EntityKind::Contact, std::slice::from_ref(&contact), IndexAlgorithm::Flat)
            .await
            .unwrap();
        manager
            .build_from_records(EntityKind::Company, std::slice::from_ref(&company), IndexAlgorithm::Flat)
            .await
            .unwrap();

        let hits = manager
            .search("Acme", &[EntityKind::Company, EntityKind::Contact], 10, 0.0)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        // equal scores resolve contact < company
        if (hits[0].score - hits[1].score).abs() < 1e-6 {
            assert_eq!(hits[0].kind, EntityKind::Contact);
        }
    }

    #[tokio::test]
    async fn test_browse_filter_snippets_and_pagination() {
        let manager = manager();
        let records: Vec<Record> = (0..10)
            .map(|i| deal(&i.to_string(), &format!("Deal number {i} for Windsurf")))
            .collect();
        manager
            .build_from_records(EntityKind::Deal, &records, IndexAlgorithm::Flat)
            .await
            .unwrap();

        let page = manager
            .browse(Some(EntityKind::Deal), 0, 3, None, false)
            .await
            .unwrap();
        assert_eq!(page.total, 10);
        assert_eq!(page.entries.len(), 3);
        assert!(page.entries[0].text.is_none());

        let filtered = manager
            .browse(Some(EntityKind::Deal), 0, 10, Some("windsurf"), true)
            .await
            .unwrap();
        assert_eq!(filtered.total, 10);
        assert!(filtered.entries[0].snippet.contains("Windsurf"));
        assert!(filtered.entries[0].text.is_some());

        let missing = manager
            .browse(Some(EntityKind::Deal), 0, 10, Some("zeppelin"), false)
            .await
            .unwrap();
        assert_eq!(missing.total, 0);
    }

    #[tokio::test]
    async fn test_rebuild_reuses_previous_configuration() {
        let manager = manager();
        manager
            .build_from_records(EntityKind::Deal, &[deal("1", "Solo")], IndexAlgorithm::Flat)
            .await
            .unwrap();
        // the stored config should survive a clear
        manager.clear(&[EntityKind::Deal]).await.unwrap();
        let config = *manager.slot(EntityKind::Deal).config.lock().unwrap();
        assert_eq!(config.algorithm, IndexAlgorithm::Flat);
        assert_eq!(manager.status(EntityKind::Deal).await, IndexStatus::Empty);
    }

    #[test]
    fn test_snippet_around_match_is_windowed() {
        let text = format!("{}needle{}", "x".repeat(100), "y".repeat(100));
        let snippet = snippet_around_match(&text, "NEEDLE").unwrap();
        assert!(snippet.contains("needle"));
        assert!(snippet.starts_with('…'));
        assert!(snippet.ends_with('…'));
        // 40 before + 6 match + 40 after + 2 ellipses
        assert_eq!(snippet.chars().count(), 88);
    }
}
