//! Covering indexes over the ingested master file.
//!
//! Indexes: (state) with rows pre-sorted revenue-descending, (NTEE code)
//! as an ordered map supporting prefix range scans, and (EIN). Table
//! statistics back the selectivity estimates used to pick the driving
//! index for a filter.

use std::collections::{BTreeMap, HashMap};

use crate::record::BmfRecord;

#[derive(Debug)]
pub struct BmfIndex {
    records: Vec<BmfRecord>,
    /// State → row positions, revenue descending then EIN ascending.
    by_state: HashMap<String, Vec<u32>>,
    /// Full NTEE code → row positions; range scans serve prefix queries.
    by_ntee: BTreeMap<String, Vec<u32>>,
    by_ein: HashMap<String, u32>,
}

impl BmfIndex {
    pub fn build(records: Vec<BmfRecord>) -> Self {
        let mut by_state: HashMap<String, Vec<u32>> = HashMap::new();
        let mut by_ntee: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        let mut by_ein: HashMap<String, u32> = HashMap::new();

        for (position, record) in records.iter().enumerate() {
            let position = position as u32;
            if !record.state.is_empty() {
                by_state.entry(record.state.clone()).or_default().push(position);
            }
            if let Some(ntee) = &record.ntee {
                by_ntee
                    .entry(ntee.as_str().to_string())
                    .or_default()
                    .push(position);
            }
            by_ein.insert(record.ein.clone(), position);
        }

        // Covering order (state, revenue desc): sort postings once so state
        // scans stream in output order.
        for postings in by_state.values_mut() {
            postings.sort_by(|a, b| {
                let ra = records[*a as usize].revenue;
                let rb = records[*b as usize].revenue;
                rb.partial_cmp(&ra)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| records[*a as usize].ein.cmp(&records[*b as usize].ein))
            });
        }

        Self {
            records,
            by_state,
            by_ntee,
            by_ein,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, position: u32) -> &BmfRecord {
        &self.records[position as usize]
    }

    pub fn by_ein(&self, ein: &str) -> Option<&BmfRecord> {
        self.by_ein.get(ein).map(|p| self.record(*p))
    }

    /// Cardinality estimate for a set of states.
    pub fn state_cardinality(&self, states: &[String]) -> usize {
        states
            .iter()
            .map(|s| {
                self.by_state
                    .get(&s.to_uppercase())
                    .map(|p| p.len())
                    .unwrap_or(0)
            })
            .sum()
    }

    /// Cardinality estimate for a set of NTEE prefixes.
    pub fn ntee_cardinality(&self, prefixes: &[String]) -> usize {
        prefixes
            .iter()
            .map(|prefix| self.ntee_range(prefix).map(|(_, p)| p.len()).sum::<usize>())
            .sum()
    }

    /// Row positions for the given states, streamed in covering order.
    pub fn state_postings(&self, states: &[String]) -> Vec<u32> {
        let mut out = Vec::new();
        for state in states {
            if let Some(postings) = self.by_state.get(&state.to_uppercase()) {
                out.extend_from_slice(postings);
            }
        }
        out
    }

    /// Row positions whose NTEE code starts with any of the prefixes.
    pub fn ntee_postings(&self, prefixes: &[String]) -> Vec<u32> {
        let mut out = Vec::new();
        for prefix in prefixes {
            for (_, postings) in self.ntee_range(prefix) {
                out.extend_from_slice(postings);
            }
        }
        out
    }

    /// Range over `by_ntee` covering every code with the given prefix.
    fn ntee_range(&self, prefix: &str) -> impl Iterator<Item = (&String, &Vec<u32>)> {
        let lower = prefix.trim().to_uppercase();
        // The first string that no longer shares the prefix: bump the last
        // byte. NTEE codes are ASCII alphanumerics, so this is exact.
        let upper = {
            let mut bytes = lower.clone().into_bytes();
            match bytes.last_mut() {
                Some(last) => {
                    *last += 1;
                    Some(String::from_utf8(bytes).unwrap_or_default())
                }
                None => None,
            }
        };
        let range: Box<dyn Iterator<Item = (&String, &Vec<u32>)>> = match upper {
            Some(upper) if !lower.is_empty() => Box::new(self.by_ntee.range(lower..upper)),
            _ => Box::new(std::iter::empty()),
        };
        range
    }

    /// Every row position, for full scans.
    pub fn all_postings(&self) -> Vec<u32> {
        (0..self.records.len() as u32).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantscout_core::normalize::NteeCode;

    fn record(ein: &str, state: &str, ntee: &str, revenue: f64) -> BmfRecord {
        BmfRecord {
            ein: ein.to_string(),
            name: format!("ORG {ein}"),
            city: "TEST".to_string(),
            state: state.to_string(),
            ntee: NteeCode::parse(ntee),
            revenue,
            assets: revenue * 2.0,
            is_private_foundation: false,
        }
    }

    fn sample() -> BmfIndex {
        BmfIndex::build(vec![
            record("54-0000001", "VA", "P20", 900_000.0),
            record("54-0000002", "VA", "P21", 600_000.0),
            record("54-0000003", "VA", "B25", 400_000.0),
            record("52-0000004", "MD", "P20", 800_000.0),
            record("52-0000005", "MD", "E21", 100_000.0),
        ])
    }

    #[test]
    fn state_postings_are_revenue_ordered() {
        let index = sample();
        let postings = index.state_postings(&["VA".to_string()]);
        let revenues: Vec<f64> = postings.iter().map(|p| index.record(*p).revenue).collect();
        assert_eq!(revenues, vec![900_000.0, 600_000.0, 400_000.0]);
    }

    #[test]
    fn ntee_prefix_range_scan() {
        let index = sample();
        assert_eq!(index.ntee_cardinality(&["P2".to_string()]), 3);
        assert_eq!(index.ntee_cardinality(&["P20".to_string()]), 2);
        assert_eq!(index.ntee_cardinality(&["Z".to_string()]), 0);

        let postings = index.ntee_postings(&["P".to_string()]);
        assert_eq!(postings.len(), 3);
    }

    #[test]
    fn ein_lookup() {
        let index = sample();
        assert_eq!(index.by_ein("52-0000004").unwrap().state, "MD");
        assert!(index.by_ein("99-9999999").is_none());
    }

    #[test]
    fn cardinality_estimates() {
        let index = sample();
        assert_eq!(index.state_cardinality(&["VA".to_string()]), 3);
        assert_eq!(
            index.state_cardinality(&["VA".to_string(), "MD".to_string()]),
            5
        );
        assert_eq!(index.state_cardinality(&["TX".to_string()]), 0);
    }
}
