//! Query result caching.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;

use crate::engine::IndexStrategy;

/// Results faster than this are not worth caching.
pub const MIN_CACHE_QUERY_MS: u64 = 10;

struct TtlEntry<V> {
    value: V,
    stored_at: Instant,
}

/// LRU cache where entries also expire after a fixed TTL.
pub struct TtlCache<V> {
    entries: Mutex<LruCache<String, TtlEntry<V>>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(100).unwrap());
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Get a live entry; expired entries are dropped on access.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut guard = self.entries.lock();
        match guard.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                guard.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: String, value: V) {
        self.entries.lock().put(
            key,
            TtlEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The engine's independently sized and expiring caches.
pub struct QueryCaches {
    /// Generic query results, keyed by a normalized `(operation, params)` string.
    results: TtlCache<Value>,

    /// Aggregate results (dashboard summary and friends), short-lived.
    aggregates: TtlCache<Value>,

    /// Derived per-page visit counts.
    visit_counts: TtlCache<u64>,

    /// Recorded index strategies. Never expires; nothing consumes it either,
    /// since the underlying store has no secondary indices to build.
    index_meta: DashMap<String, IndexStrategy>,
}

impl QueryCaches {
    pub fn new(
        results_capacity: usize,
        results_ttl: Duration,
        aggregates_ttl: Duration,
        visit_counts_ttl: Duration,
    ) -> Self {
        Self {
            results: TtlCache::new(results_capacity, results_ttl),
            aggregates: TtlCache::new(100, aggregates_ttl),
            visit_counts: TtlCache::new(5000, visit_counts_ttl),
            index_meta: DashMap::new(),
        }
    }

    pub fn get_result(&self, key: &str) -> Option<Value> {
        self.results.get(key)
    }

    pub fn set_result(&self, key: String, value: Value) {
        self.results.put(key, value);
    }

    pub fn get_aggregate(&self, key: &str) -> Option<Value> {
        self.aggregates.get(key)
    }

    pub fn set_aggregate(&self, key: String, value: Value) {
        self.aggregates.put(key, value);
    }

    pub fn get_visit_count(&self, page_id: &str) -> Option<u64> {
        self.visit_counts.get(page_id)
    }

    pub fn set_visit_count(&self, page_id: &str, count: u64) {
        self.visit_counts.put(page_id.to_string(), count);
    }

    pub fn record_index(&self, strategy: IndexStrategy) {
        self.index_meta.insert(strategy.name.clone(), strategy);
    }

    pub fn recorded_indexes(&self) -> Vec<IndexStrategy> {
        self.index_meta.iter().map(|e| e.value().clone()).collect()
    }

    /// Drop every cached result. Recorded index strategies survive.
    pub fn invalidate_all(&self) {
        self.results.clear();
        self.aggregates.clear();
        self.visit_counts.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            results_count: self.results.len(),
            aggregates_count: self.aggregates.len(),
            visit_counts_count: self.visit_counts.len(),
            recorded_indexes: self.index_meta.len(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub results_count: usize,
    pub aggregates_count: usize,
    pub visit_counts_count: usize,
    pub recorded_indexes: usize,
}

/// Normalized cache key: `op` plus sorted-order `name:value` pairs.
pub fn cache_key(op: &str, params: &[(&str, String)]) -> String {
    let mut key = String::from(op);
    for (name, value) in params {
        key.push(' ');
        key.push_str(name);
        key.push(':');
        key.push_str(value);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_cache_set_and_get() {
        let cache: TtlCache<u64> = TtlCache::new(10, Duration::from_secs(60));
        cache.put("a".into(), 1);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn test_ttl_cache_expires() {
        let cache: TtlCache<u64> = TtlCache::new(10, Duration::from_millis(10));
        cache.put("a".into(), 1);
        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(cache.get("a"), None);
        // the expired entry was dropped on access
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_ttl_cache_lru_eviction() {
        let cache: TtlCache<u64> = TtlCache::new(2, Duration::from_secs(60));
        cache.put("a".into(), 1);
        cache.put("b".into(), 2);
        cache.put("c".into(), 3);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_ttl_cache_zero_capacity_uses_default() {
        let cache: TtlCache<u64> = TtlCache::new(0, Duration::from_secs(60));
        cache.put("a".into(), 1);
        assert_eq!(cache.get("a"), Some(1));
    }

    #[test]
    fn test_cache_key_is_stable() {
        let key = cache_key(
            "find_pages",
            &[
                ("term", "rust".to_string()),
                ("limit", "20".to_string()),
                ("offset", "0".to_string()),
            ],
        );
        assert_eq!(key, "find_pages term:rust limit:20 offset:0");
    }

    #[test]
    fn test_invalidate_all_keeps_recorded_indexes() {
        let caches = QueryCaches::new(
            100,
            Duration::from_secs(60),
            Duration::from_secs(60),
            Duration::from_secs(60),
        );
        caches.set_result("k".into(), Value::Null);
        caches.set_visit_count("page:1-a", 5);
        caches.record_index(IndexStrategy::new("pages_by_url", "page", vec!["url".into()]));

        caches.invalidate_all();

        let stats = caches.stats();
        assert_eq!(stats.results_count, 0);
        assert_eq!(stats.visit_counts_count, 0);
        assert_eq!(stats.recorded_indexes, 1);
    }
}
