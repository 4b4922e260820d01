//! Parsed-filing cache. Filings are immutable once parsed and never
//! evicted; only the raw XML they came from may be re-fetched.

use std::sync::Arc;

use dashmap::DashMap;

use grantscout_core::{Filing, FilingKey};

#[derive(Default)]
pub struct FilingCache {
    by_key: DashMap<FilingKey, Arc<Filing>>,
    /// EIN → keys of every cached filing for that organization.
    by_ein: DashMap<String, Vec<FilingKey>>,
}

impl FilingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parsed filing. First write wins: a filing is immutable, so
    /// a concurrent re-parse of the same key returns the original Arc.
    pub fn put(&self, filing: Filing) -> Arc<Filing> {
        let key = filing.key.clone();
        let entry = self
            .by_key
            .entry(key.clone())
            .or_insert_with(|| Arc::new(filing));
        let stored = entry.clone();
        drop(entry);

        let mut keys = self.by_ein.entry(key.ein.clone()).or_default();
        if !keys.contains(&key) {
            keys.push(key);
            keys.sort_by(|a, b| b.tax_year.cmp(&a.tax_year));
        }
        stored
    }

    pub fn get(&self, key: &FilingKey) -> Option<Arc<Filing>> {
        self.by_key.get(key).map(|e| e.clone())
    }

    /// Most recent filing of any kind for an EIN.
    pub fn latest(&self, ein: &str) -> Option<Arc<Filing>> {
        let keys = self.by_ein.get(ein)?;
        keys.first().and_then(|k| self.get(k))
    }

    /// Every cached filing for an EIN, newest first.
    pub fn all_for(&self, ein: &str) -> Vec<Arc<Filing>> {
        let Some(keys) = self.by_ein.get(ein) else {
            return Vec::new();
        };
        keys.iter().filter_map(|k| self.get(k)).collect()
    }

    /// EINs with at least one cached filing.
    pub fn eins(&self) -> Vec<String> {
        self.by_ein.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
