//! Tool-result cache: LRU within a size cap, per-tool TTL, and a per-tool
//! minimum retention so one chatty tool cannot flush every other tool's
//! results.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

use grantscout_core::{Fingerprint, ToolResult};

#[derive(Debug, Clone)]
pub struct ResultCacheConfig {
    pub capacity: usize,
    /// Entries per tool shielded from LRU eviction.
    pub per_tool_min_retention: usize,
    /// Applied when a result's tool declares no TTL of its own.
    pub default_ttl: Option<Duration>,
}

impl Default for ResultCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            per_tool_min_retention: 8,
            default_ttl: Some(Duration::from_secs(24 * 60 * 60)),
        }
    }
}

struct Entry {
    result: ToolResult,
    inserted_at: Instant,
    ttl: Option<Duration>,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.duration_since(self.inserted_at) >= ttl,
            None => false,
        }
    }
}

struct Inner {
    entries: LruCache<Fingerprint, Entry>,
    /// Tool id → live entry count, maintained on insert/evict.
    per_tool: HashMap<String, usize>,
}

pub struct ResultCache {
    inner: Mutex<Inner>,
    config: ResultCacheConfig,
}

impl ResultCache {
    pub fn new(config: ResultCacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                per_tool: HashMap::new(),
            }),
            config,
        }
    }

    /// Fresh result for a fingerprint, promoting it to most-recently-used.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<ToolResult> {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        if inner.entries.get(fingerprint).map(|e| e.expired(now)) == Some(true) {
            if let Some(entry) = inner.entries.pop(fingerprint) {
                decrement(&mut inner.per_tool, &entry.result.tool_id);
            }
            return None;
        }
        inner.entries.get(fingerprint).map(|e| e.result.clone())
    }

    /// Cache a successful result. Failures are never cached: a fingerprint
    /// refers to at most one successful result.
    pub fn put(&self, result: ToolResult, ttl: Option<Duration>) {
        if !result.success {
            return;
        }
        let ttl = ttl.or(self.config.default_ttl);
        let mut inner = self.inner.lock();

        if inner.entries.len() >= self.config.capacity && !inner.entries.contains(&result.fingerprint)
        {
            self.evict_one(&mut inner);
        }

        let tool_id = result.tool_id.clone();
        let previous = inner.entries.push(
            result.fingerprint.clone(),
            Entry {
                result,
                inserted_at: Instant::now(),
                ttl,
            },
        );
        match previous {
            // push replaced the same key: tool count is unchanged.
            Some((_, old)) if old.result.tool_id == tool_id => {}
            Some((_, old)) => {
                decrement(&mut inner.per_tool, &old.result.tool_id);
                *inner.per_tool.entry(tool_id).or_insert(0) += 1;
            }
            None => *inner.per_tool.entry(tool_id).or_insert(0) += 1,
        }
    }

    /// Evict the least-recently-used entry whose tool still holds more than
    /// the minimum retention. Protected entries are re-inserted in their
    /// original recency order.
    fn evict_one(&self, inner: &mut Inner) {
        let mut protected = Vec::new();
        let mut evicted = false;
        // Bounded scan: after `capacity` pops the cache is empty anyway.
        for _ in 0..self.config.capacity {
            let Some((key, entry)) = inner.entries.pop_lru() else {
                break;
            };
            let count = inner
                .per_tool
                .get(&entry.result.tool_id)
                .copied()
                .unwrap_or(0);
            if count > self.config.per_tool_min_retention || entry.expired(Instant::now()) {
                decrement(&mut inner.per_tool, &entry.result.tool_id);
                evicted = true;
                break;
            }
            protected.push((key, entry));
        }
        if !evicted {
            // Every entry is protected; drop the overall LRU after all.
            if let Some((_, entry)) = protected.pop() {
                decrement(&mut inner.per_tool, &entry.result.tool_id);
            }
        }
        // Restore protected entries oldest-first so recency is preserved.
        for (key, entry) in protected.into_iter().rev() {
            inner.entries.push(key, entry);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn decrement(per_tool: &mut HashMap<String, usize>, tool_id: &str) {
    if let Some(count) = per_tool.get_mut(tool_id) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            per_tool.remove(tool_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn result(tool: &str, seq: u32) -> ToolResult {
        let input = json!({"seq": seq});
        ToolResult {
            fingerprint: Fingerprint::compute(tool, "1.0.0", &input),
            tool_id: tool.to_string(),
            tool_version: "1.0.0".to_string(),
            produced_at: Utc::now(),
            payload: json!({"seq": seq}),
            cost: 0.0,
            latency_ms: 1,
            success: true,
            error_kind: None,
        }
    }

    #[test]
    fn get_returns_cached_payload() {
        let cache = ResultCache::new(ResultCacheConfig::default());
        let r = result("bmf_filter", 1);
        let fp = r.fingerprint.clone();
        cache.put(r, None);

        let hit = cache.get(&fp).unwrap();
        assert_eq!(hit.payload, json!({"seq": 1}));
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = ResultCache::new(ResultCacheConfig::default());
        let mut r = result("bmf_filter", 1);
        r.success = false;
        let fp = r.fingerprint.clone();
        cache.put(r, None);
        assert!(cache.get(&fp).is_none());
    }

    #[test]
    fn expired_entries_are_dropped_on_read() {
        let cache = ResultCache::new(ResultCacheConfig::default());
        let r = result("fast_screen", 1);
        let fp = r.fingerprint.clone();
        cache.put(r, Some(Duration::from_nanos(1)));
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.get(&fp).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn lru_eviction_respects_min_retention() {
        let cache = ResultCache::new(ResultCacheConfig {
            capacity: 4,
            per_tool_min_retention: 2,
            default_ttl: None,
        });

        // Two entries for "small" (protected at min retention), then fill
        // with "big" entries.
        let small: Vec<_> = (0..2).map(|i| result("small", i)).collect();
        let small_fps: Vec<_> = small.iter().map(|r| r.fingerprint.clone()).collect();
        for r in small {
            cache.put(r, None);
        }
        for i in 0..6 {
            cache.put(result("big", i), None);
        }

        // The small tool keeps its minimum retention despite being LRU.
        assert!(cache.get(&small_fps[0]).is_some());
        assert!(cache.get(&small_fps[1]).is_some());
        assert_eq!(cache.len(), 4);
    }
}
