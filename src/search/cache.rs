//! Shared query-result cache
//!
//! Bounded both by entry count and by an approximate memory ceiling. Entries
//! expire after a TTL and are never invalidated by writes; keys carry the
//! reader generation, so a commit makes older entries unreachable.

use crate::config::SearchConfig;
use crate::metrics::SEARCH_METRICS;
use crate::search::service::FacetCount;
use moka::sync::Cache;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

/// Hits of one page as computed by the executor
#[derive(Debug, Clone)]
pub struct CachedPage {
    pub total_hits: u64,
    pub objects: Vec<Map<String, Value>>,
    pub facets: BTreeMap<String, Vec<FacetCount>>,
    pub cursor: Option<String>,
}

impl CachedPage {
    /// Rough heap footprint in bytes
    fn weight(&self) -> u32 {
        let objects: usize = self
            .objects
            .iter()
            .map(|o| serde_json::to_string(o).map(|s| s.len()).unwrap_or(0))
            .sum();
        let facets: usize = self
            .facets
            .values()
            .flat_map(|counts| counts.iter().map(|c| c.name.len() + 16))
            .sum();
        (objects + facets + 64).min(u32::MAX as usize) as u32
    }
}

/// Decides whether a query has been used often enough to be cached
pub struct UsageTrackingPolicy {
    min_frequency: u32,
    history_size: usize,
    state: Mutex<UsageHistory>,
}

#[derive(Default)]
struct UsageHistory {
    recent: VecDeque<u64>,
    counts: HashMap<u64, u32>,
}

impl UsageTrackingPolicy {
    pub fn new(min_frequency: u32, history_size: usize) -> Self {
        Self {
            min_frequency,
            history_size: history_size.max(1),
            state: Mutex::new(UsageHistory::default()),
        }
    }

    fn fingerprint(key: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    /// Record one use of a query
    pub fn on_use(&self, key: &str) {
        let hash = Self::fingerprint(key);
        let mut state = self.state.lock();

        state.recent.push_back(hash);
        *state.counts.entry(hash).or_insert(0) += 1;

        while state.recent.len() > self.history_size {
            if let Some(evicted) = state.recent.pop_front() {
                if let Some(count) = state.counts.get_mut(&evicted) {
                    *count -= 1;
                    if *count == 0 {
                        state.counts.remove(&evicted);
                    }
                }
            }
        }
    }

    /// Whether a query was used at least `min_frequency` times recently
    pub fn should_cache(&self, key: &str) -> bool {
        let hash = Self::fingerprint(key);
        let state = self.state.lock();
        state.counts.get(&hash).copied().unwrap_or(0) >= self.min_frequency
    }
}

/// Process-wide query cache; disabled when configured with zero entries
#[derive(Clone)]
pub struct QueryCache {
    cache: Option<Cache<String, Arc<CachedPage>>>,
    policy: Arc<UsageTrackingPolicy>,
}

impl QueryCache {
    pub fn new(config: &SearchConfig) -> Self {
        let policy = Arc::new(UsageTrackingPolicy::new(
            config.cache_min_frequency,
            config.cache_history,
        ));

        if config.cache_max_entries == 0 || config.cache_max_bytes == 0 {
            tracing::warn!("Query cache disabled, searches run uncached");
            return Self {
                cache: None,
                policy,
            };
        }

        // Every entry weighs at least ceiling / entries, which caps the entry count
        let floor = (config.cache_max_bytes / config.cache_max_entries).max(1);
        let floor = floor.min(u32::MAX as u64) as u32;

        let cache = Cache::builder()
            .max_capacity(config.cache_max_bytes)
            .weigher(move |_key: &String, page: &Arc<CachedPage>| page.weight().max(floor))
            .time_to_live(Duration::from_secs(config.cache_ttl_secs.max(1)))
            .build();

        Self {
            cache: Some(cache),
            policy,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Look a page up and record the use for the caching policy
    pub fn get(&self, key: &str) -> Option<Arc<CachedPage>> {
        let cache = self.cache.as_ref()?;
        self.policy.on_use(key);

        let hit = cache.get(key);
        if hit.is_some() {
            SEARCH_METRICS.cache_hits.inc();
        } else {
            SEARCH_METRICS.cache_misses.inc();
        }
        hit
    }

    /// Store a page if the policy considers the query worth caching
    pub fn put(&self, key: String, page: Arc<CachedPage>) -> bool {
        match &self.cache {
            Some(cache) if self.policy.should_cache(&key) => {
                cache.insert(key, page);
                true
            }
            _ => false,
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.as_ref().map(|c| c.entry_count()).unwrap_or(0)
    }

    pub fn weighted_size(&self) -> u64 {
        self.cache.as_ref().map(|c| c.weighted_size()).unwrap_or(0)
    }

    /// Apply pending evictions; used by tests to observe bounds
    pub fn run_pending_tasks(&self) {
        if let Some(cache) = &self.cache {
            cache.run_pending_tasks();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(hits: u64) -> Arc<CachedPage> {
        Arc::new(CachedPage {
            total_hits: hits,
            objects: Vec::new(),
            facets: BTreeMap::new(),
            cursor: None,
        })
    }

    #[test]
    fn test_policy_requires_repeated_use() {
        let policy = UsageTrackingPolicy::new(2, 4);
        policy.on_use("q1");
        assert!(!policy.should_cache("q1"));
        policy.on_use("q1");
        assert!(policy.should_cache("q1"));

        // Old uses fall out of the history window
        for key in ["a", "b", "c", "d"] {
            policy.on_use(key);
        }
        assert!(!policy.should_cache("q1"));
    }

    #[test]
    fn test_cache_stores_after_second_use() {
        let config = SearchConfig::default();
        let cache = QueryCache::new(&config);

        assert!(cache.get("k").is_none());
        assert!(!cache.put("k".to_string(), page(1)));
        assert!(cache.get("k").is_none());
        assert!(cache.put("k".to_string(), page(1)));
        assert_eq!(cache.get("k").map(|p| p.total_hits), Some(1));
    }

    #[test]
    fn test_entry_count_is_bounded() {
        let config = SearchConfig {
            cache_max_entries: 4,
            cache_max_bytes: 4096,
            cache_min_frequency: 1,
            ..Default::default()
        };
        let cache = QueryCache::new(&config);

        for i in 0..32 {
            let key = format!("q{}", i);
            cache.get(&key);
            cache.put(key, page(i));
        }
        cache.run_pending_tasks();
        assert!(cache.entry_count() <= 4);
        assert!(cache.weighted_size() <= 4096);
    }

    #[test]
    fn test_zero_entries_disables_cache() {
        let config = SearchConfig {
            cache_max_entries: 0,
            ..Default::default()
        };
        let cache = QueryCache::new(&config);
        assert!(!cache.is_enabled());
        assert!(cache.get("k").is_none());
        assert!(!cache.put("k".to_string(), page(0)));
    }
}
