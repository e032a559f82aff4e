// src/cache.rs
// TTL cache with single-flight loads, keyed by (method, args, api key)

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{Result, ServerError};
use crate::format::ToolReply;
use crate::hubspot::EntityKind;

/// SHA-256 of method ‖ 0x1F ‖ canonical args ‖ 0x1F ‖ api key.
pub type CacheKey = [u8; 32];

/// Snapshot returned by `info`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub size: u64,
    pub full_records: u64,
    pub capacity: u64,
    pub ttl_seconds: u64,
    pub sample_keys: Vec<String>,
}

/// Outcome of `clear`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheClearReport {
    pub cleared: u64,
    pub capacity: u64,
    pub ttl_seconds: u64,
}

/// Shared result cache. Entries are opaque tool replies; the api-key
/// component of the key partitions tenants so results never leak across
/// credentials. A second section holds complete-property records from
/// bulk loads, keyed by (kind, id).
pub struct ToolCache {
    results: moka::future::Cache<CacheKey, Arc<ToolReply>>,
    full: moka::future::Cache<(EntityKind, String), Arc<Value>>,
    capacity: u64,
    ttl: Duration,
}

impl ToolCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            results: moka::future::Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
            full: moka::future::Cache::builder()
                .max_capacity(capacity.saturating_mul(50))
                .time_to_live(ttl)
                .build(),
            capacity,
            ttl,
        }
    }

    /// Build the cache key for a tool invocation.
    pub fn key(method: &str, args: &Value, api_key: &str) -> CacheKey {
        let mut hasher = Sha256::new();
        hasher.update(method.as_bytes());
        hasher.update([0x1F]);
        hasher.update(canonical_json(args).as_bytes());
        hasher.update([0x1F]);
        hasher.update(api_key.as_bytes());
        let digest = hasher.finalize();
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        key
    }

    /// Return the live entry for `key`, or run `loader` exactly once for
    /// all concurrent callers and share its result. Loader failures reach
    /// every waiter and never populate the cache.
    pub async fn get_or_compute<F>(
        &self,
        key: CacheKey,
        loader: F,
    ) -> Result<Arc<ToolReply>>
    where
        F: Future<Output = Result<ToolReply>>,
    {
        self.results
            .try_get_with(key, async move { loader.await.map(Arc::new) })
            .await
            .map_err(|shared: Arc<ServerError>| (*shared).clone())
    }

    /// Store one complete-property record from a bulk load.
    pub async fn put_full_record(&self, kind: EntityKind, id: String, record: Value) {
        self.full.insert((kind, id), Arc::new(record)).await;
    }

    pub async fn get_full_record(&self, kind: EntityKind, id: &str) -> Option<Arc<Value>> {
        self.full.get(&(kind, id.to_string())).await
    }

    pub async fn clear(&self) -> CacheClearReport {
        self.results.run_pending_tasks().await;
        self.full.run_pending_tasks().await;
        let cleared = self.results.entry_count() + self.full.entry_count();
        self.results.invalidate_all();
        self.full.invalidate_all();
        self.results.run_pending_tasks().await;
        self.full.run_pending_tasks().await;
        CacheClearReport {
            cleared,
            capacity: self.capacity,
            ttl_seconds: self.ttl.as_secs(),
        }
    }

    pub async fn info(&self) -> CacheInfo {
        self.results.run_pending_tasks().await;
        self.full.run_pending_tasks().await;
        let sample_keys = self
            .results
            .iter()
            .take(10)
            .map(|(key, _)| {
                let hex: String = key.iter().take(8).map(|b| format!("{b:02x}")).collect();
                format!("{hex}…")
            })
            .collect();
        CacheInfo {
            size: self.results.entry_count(),
            full_records: self.full.entry_count(),
            capacity: self.capacity,
            ttl_seconds: self.ttl.as_secs(),
            sample_keys,
        }
    }
}

/// Serialize with object keys sorted recursively and no extra whitespace,
/// so argument maps hash identically regardless of insertion order.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap_or_default());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn reply(text: &str) -> ToolReply {
        ToolReply::new(text.to_string(), json!({"text": text}))
    }

    #[test]
    fn test_canonical_json_sorts_keys_recursively() {
        let a = json!({"b": 1, "a": {"z": true, "m": [1, 2]}});
        let b = json!({"a": {"m": [1, 2], "z": true}, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(canonical_json(&a), r#"{"a":{"m":[1,2],"z":true},"b":1}"#);
    }

    #[test]
    fn test_equal_args_equal_keys_distinct_tenants_distinct_keys() {
        let args1 = json!({"limit": 10, "after": null});
        let args2 = json!({"after": null, "limit": 10});
        assert_eq!(
            ToolCache::key("list", &args1, "k1"),
            ToolCache::key("list", &args2, "k1")
        );
        assert_ne!(
            ToolCache::key("list", &args1, "k1"),
            ToolCache::key("list", &args1, "k2")
        );
        assert_ne!(
            ToolCache::key("list", &args1, "k1"),
            ToolCache::key("search", &args1, "k1")
        );
    }

    #[tokio::test]
    async fn test_single_flight_loads_once() {
        let cache = Arc::new(ToolCache::new(100, Duration::from_secs(60)));
        let loads = Arc::new(AtomicUsize::new(0));
        let key = ToolCache::key("list", &json!({"limit": 10}), "k");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let loads = loads.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(key, async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(reply("payload"))
                    })
                    .await
            }));
        }
        for handle in handles {
            let value = handle.await.unwrap().unwrap();
            assert_eq!(value.markdown, "payload");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loader_errors_are_not_cached() {
        let cache = ToolCache::new(100, Duration::from_secs(60));
        let key = ToolCache::key("list", &json!({}), "k");

        let err = cache
            .get_or_compute(key, async { Err(ServerError::transient("boom")) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "transient_error");

        let value = cache
            .get_or_compute(key, async { Ok(reply("recovered")) })
            .await
            .unwrap();
        assert_eq!(value.markdown, "recovered");
    }

    #[tokio::test]
    async fn test_expired_entries_are_recomputed() {
        let cache = ToolCache::new(100, Duration::from_millis(50));
        let key = ToolCache::key("list", &json!({}), "k");

        let first = cache
            .get_or_compute(key, async { Ok(reply("v1")) })
            .await
            .unwrap();
        assert_eq!(first.markdown, "v1");

        tokio::time::sleep(Duration::from_millis(80)).await;

        let second = cache
            .get_or_compute(key, async { Ok(reply("v2")) })
            .await
            .unwrap();
        assert_eq!(second.markdown, "v2");
    }

    #[tokio::test]
    async fn test_clear_then_info_reports_empty() {
        let cache = ToolCache::new(100, Duration::from_secs(60));
        for i in 0..5 {
            let key = ToolCache::key("list", &json!({ "i": i }), "k");
            cache
                .get_or_compute(key, async move { Ok(reply(&format!("v{i}"))) })
                .await
                .unwrap();
        }
        cache
            .put_full_record(EntityKind::Deal, "1".into(), json!({"id": "1"}))
            .await;

        let info = cache.info().await;
        assert_eq!(info.size, 5);
        assert_eq!(info.full_records, 1);
        assert_eq!(info.capacity, 100);
        assert!(!info.sample_keys.is_empty());
        assert!(info.sample_keys[0].ends_with('…'));

        let report = cache.clear().await;
        assert_eq!(report.cleared, 6);

        let info = cache.info().await;
        assert_eq!(info.size, 0);
        assert_eq!(info.full_records, 0);
    }
}
