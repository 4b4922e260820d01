//! Multi-predicate filter evaluation.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::index::BmfIndex;
use crate::record::BmfRecord;

/// Predicate set over BMF columns. Every field is optional; an entirely
/// empty criteria set returns an empty result, never the whole file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default)]
    pub states: Vec<String>,
    /// With an empty state list, lifts the state restriction entirely.
    #[serde(default)]
    pub nationwide: bool,
    /// NTEE codes or prefixes; `P2` matches `P20` and `P25`.
    #[serde(default)]
    pub ntee_prefixes: Vec<String>,
    pub revenue_min: Option<f64>,
    pub revenue_max: Option<f64>,
    pub asset_min: Option<f64>,
    pub asset_max: Option<f64>,
    /// Restrict to private foundations (or explicitly exclude them).
    pub private_foundation: Option<bool>,
    /// Case-insensitive substring over the organization name.
    pub name_contains: Option<String>,
}

impl FilterCriteria {
    /// True when no predicate is set at all.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
            && !self.nationwide
            && self.ntee_prefixes.is_empty()
            && self.revenue_min.is_none()
            && self.revenue_max.is_none()
            && self.asset_min.is_none()
            && self.asset_max.is_none()
            && self.private_foundation.is_none()
            && self.name_contains.is_none()
    }

    fn state_restricted(&self) -> bool {
        !self.states.is_empty() && !self.nationwide
    }
}

/// Projection of the columns callers ask for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgRow {
    pub ein: String,
    pub name: String,
    pub city: String,
    pub state: String,
    pub ntee: Option<String>,
    pub revenue: f64,
    pub assets: f64,
    pub is_private_foundation: bool,
}

impl From<&BmfRecord> for OrgRow {
    fn from(record: &BmfRecord) -> Self {
        Self {
            ein: record.ein.clone(),
            name: record.name.clone(),
            city: record.city.clone(),
            state: record.state.clone(),
            ntee: record.ntee.as_ref().map(|n| n.as_str().to_string()),
            revenue: record.revenue,
            assets: record.assets,
            is_private_foundation: record.is_private_foundation,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FilterPerformance {
    pub rows_scanned: usize,
    pub rows_matched: usize,
    pub elapsed_ms: f64,
    /// Which index drove the scan: `state`, `ntee`, or `full`.
    pub driving_index: DrivingIndex,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrivingIndex {
    State,
    Ntee,
    #[default]
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterOutcome {
    pub rows: Vec<OrgRow>,
    pub performance: FilterPerformance,
}

impl BmfIndex {
    /// Evaluate a filter. The most selective indexed predicate drives the
    /// scan; remaining predicates stream over the candidates in memory.
    /// Result order is revenue descending, ties broken by EIN ascending.
    pub fn filter(&self, criteria: &FilterCriteria) -> FilterOutcome {
        let started = Instant::now();

        if criteria.is_empty() {
            return FilterOutcome {
                rows: Vec::new(),
                performance: FilterPerformance {
                    elapsed_ms: elapsed_ms(started),
                    ..FilterPerformance::default()
                },
            };
        }

        let (candidates, driving_index) = self.pick_candidates(criteria);
        let rows_scanned = candidates.len();

        let mut matches: Vec<&BmfRecord> = candidates
            .into_iter()
            .map(|p| self.record(p))
            .filter(|r| evaluate(criteria, r))
            .collect();

        matches.sort_by(|a, b| {
            b.revenue
                .partial_cmp(&a.revenue)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.ein.cmp(&b.ein))
        });
        matches.dedup_by(|a, b| a.ein == b.ein);

        let rows: Vec<OrgRow> = matches.iter().map(|r| OrgRow::from(*r)).collect();
        let performance = FilterPerformance {
            rows_scanned,
            rows_matched: rows.len(),
            elapsed_ms: elapsed_ms(started),
            driving_index,
        };
        tracing::debug!(
            scanned = performance.rows_scanned,
            matched = performance.rows_matched,
            index = ?performance.driving_index,
            "BMF filter evaluated"
        );

        FilterOutcome { rows, performance }
    }

    /// Choose the driving index from cardinality estimates.
    fn pick_candidates(&self, criteria: &FilterCriteria) -> (Vec<u32>, DrivingIndex) {
        let state_estimate = criteria
            .state_restricted()
            .then(|| self.state_cardinality(&criteria.states));
        let ntee_estimate = (!criteria.ntee_prefixes.is_empty())
            .then(|| self.ntee_cardinality(&criteria.ntee_prefixes));

        match (state_estimate, ntee_estimate) {
            (Some(s), Some(n)) if s <= n => {
                (self.state_postings(&criteria.states), DrivingIndex::State)
            }
            (_, Some(_)) => (
                self.ntee_postings(&criteria.ntee_prefixes),
                DrivingIndex::Ntee,
            ),
            (Some(_), None) => (self.state_postings(&criteria.states), DrivingIndex::State),
            (None, None) => (self.all_postings(), DrivingIndex::Full),
        }
    }
}

fn evaluate(criteria: &FilterCriteria, record: &BmfRecord) -> bool {
    if criteria.state_restricted()
        && !criteria
            .states
            .iter()
            .any(|s| s.eq_ignore_ascii_case(&record.state))
    {
        return false;
    }

    if !criteria.ntee_prefixes.is_empty() {
        let Some(ntee) = &record.ntee else {
            return false;
        };
        if !criteria.ntee_prefixes.iter().any(|p| ntee.matches_prefix(p)) {
            return false;
        }
    }

    if let Some(min) = criteria.revenue_min {
        if record.revenue < min {
            return false;
        }
    }
    if let Some(max) = criteria.revenue_max {
        if record.revenue > max {
            return false;
        }
    }
    if let Some(min) = criteria.asset_min {
        if record.assets < min {
            return false;
        }
    }
    if let Some(max) = criteria.asset_max {
        if record.assets > max {
            return false;
        }
    }
    if let Some(required) = criteria.private_foundation {
        if record.is_private_foundation != required {
            return false;
        }
    }
    if let Some(needle) = &criteria.name_contains {
        if !record.name_upper().contains(&needle.to_uppercase()) {
            return false;
        }
    }
    true
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1_000.0
}
