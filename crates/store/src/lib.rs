//! In-process intelligence store
//!
//! Read-through cache plus indexed storage behind the
//! [`IntelligenceStore`](grantscout_core::IntelligenceStore) contract:
//! parsed filings (never evicted), tool results (LRU within a size cap,
//! per-tool TTL and minimum retention), and the triage queue (append-only
//! log with a mutable status projection). Writers serialize per key;
//! readers are lock-free where the underlying map allows it.

mod filing_cache;
mod result_cache;
mod triage_queue;

pub use filing_cache::FilingCache;
pub use result_cache::{ResultCache, ResultCacheConfig};
pub use triage_queue::TriageQueue;

use std::sync::Arc;
use std::time::Duration;

use grantscout_core::{Filing, FilingKey, Fingerprint, IntelligenceStore, ToolResult, TriageItem};

/// The store handle handed to tool contexts.
pub struct MemoryStore {
    pub filings: FilingCache,
    pub results: ResultCache,
    pub triage: TriageQueue,
}

impl MemoryStore {
    pub fn new(result_cache: ResultCacheConfig) -> Self {
        Self {
            filings: FilingCache::new(),
            results: ResultCache::new(result_cache),
            triage: TriageQueue::new(),
        }
    }

    pub fn shared(result_cache: ResultCacheConfig) -> Arc<Self> {
        Arc::new(Self::new(result_cache))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(ResultCacheConfig::default())
    }
}

impl IntelligenceStore for MemoryStore {
    fn get_result(&self, fingerprint: &Fingerprint) -> Option<ToolResult> {
        self.results.get(fingerprint)
    }

    fn put_result(&self, result: ToolResult, ttl: Option<Duration>) {
        self.results.put(result, ttl);
    }

    fn get_filing(&self, key: &FilingKey) -> Option<Arc<Filing>> {
        self.filings.get(key)
    }

    fn put_filing(&self, filing: Filing) -> Arc<Filing> {
        self.filings.put(filing)
    }

    fn latest_filing(&self, ein: &str) -> Option<Arc<Filing>> {
        self.filings.latest(ein)
    }

    fn filings_for(&self, ein: &str) -> Vec<Arc<Filing>> {
        self.filings.all_for(ein)
    }

    fn filing_eins(&self) -> Vec<String> {
        self.filings.eins()
    }

    fn enqueue_triage(&self, item: TriageItem) -> bool {
        self.triage.enqueue(item)
    }
}
