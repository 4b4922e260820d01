//! Reliability safeguards composed into the final decision.
//!
//! Three checks: filing recency, grant history, and border proximity.
//! Recency and border-proximity violations are hard flags (abstain
//! triggers); a sporadic-but-active grant history is advisory unless the
//! foundation shows no grant activity at all inside the lookback.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use grantscout_config::{SafeguardThresholds, StateAdjacency};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafeguardFacts {
    /// Most recent tax year on record for the foundation.
    pub latest_filing_year: Option<i32>,
    /// Tax years in which the foundation reported grants paid.
    pub grant_years: Vec<i32>,
    /// States the grant-seeker serves.
    pub profile_states: Vec<String>,
    pub profile_nationwide: bool,
    /// States the foundation's giving focuses on; empty means national.
    pub foundation_focus: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeguardFlag {
    pub name: String,
    pub detail: String,
    /// Hard flags force Abstain; soft flags only annotate.
    pub hard: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafeguardReport {
    pub flags: Vec<SafeguardFlag>,
}

impl SafeguardReport {
    pub fn hard_flags(&self) -> impl Iterator<Item = &SafeguardFlag> {
        self.flags.iter().filter(|f| f.hard)
    }

    pub fn has_hard_flag(&self) -> bool {
        self.flags.iter().any(|f| f.hard)
    }
}

pub struct Safeguards<'a> {
    thresholds: &'a SafeguardThresholds,
    adjacency: &'a StateAdjacency,
}

impl<'a> Safeguards<'a> {
    pub fn new(thresholds: &'a SafeguardThresholds, adjacency: &'a StateAdjacency) -> Self {
        Self {
            thresholds,
            adjacency,
        }
    }

    pub fn evaluate(&self, facts: &SafeguardFacts) -> SafeguardReport {
        let mut flags = Vec::new();
        let current_year = Utc::now().year();

        match facts.latest_filing_year {
            Some(year) if current_year - year > self.thresholds.filing_recency_years => {
                flags.push(SafeguardFlag {
                    name: "filing_recency".to_string(),
                    detail: format!(
                        "most recent filing is from {year}, more than {} years old",
                        self.thresholds.filing_recency_years
                    ),
                    hard: true,
                });
            }
            None => flags.push(SafeguardFlag {
                name: "filing_recency".to_string(),
                detail: "no filing on record".to_string(),
                hard: true,
            }),
            Some(_) => {}
        }

        let lookback_start = current_year - self.thresholds.grant_history_lookback_years;
        let mut recent_years: Vec<i32> = facts
            .grant_years
            .iter()
            .copied()
            .filter(|y| *y >= lookback_start)
            .collect();
        recent_years.sort_unstable();
        recent_years.dedup();
        if recent_years.is_empty() {
            flags.push(SafeguardFlag {
                name: "grant_history".to_string(),
                detail: format!(
                    "no grants reported in the last {} years",
                    self.thresholds.grant_history_lookback_years
                ),
                hard: true,
            });
        } else if recent_years.len() < self.thresholds.min_grant_years {
            flags.push(SafeguardFlag {
                name: "grant_history".to_string(),
                detail: format!(
                    "grants reported in only {} of the last {} years",
                    recent_years.len(),
                    self.thresholds.grant_history_lookback_years
                ),
                hard: false,
            });
        }

        if self.service_area_outside_focus(facts) {
            flags.push(SafeguardFlag {
                name: "border_proximity".to_string(),
                detail: "service area lies entirely outside the foundation's geographic focus"
                    .to_string(),
                hard: true,
            });
        }

        SafeguardReport { flags }
    }

    /// True when no profile state is inside or adjacent to the foundation
    /// focus. An empty focus means national giving, which always overlaps.
    fn service_area_outside_focus(&self, facts: &SafeguardFacts) -> bool {
        if facts.foundation_focus.is_empty() || facts.profile_nationwide {
            return false;
        }
        if facts.profile_states.is_empty() {
            return false;
        }
        !facts.profile_states.iter().any(|ps| {
            facts
                .foundation_focus
                .iter()
                .any(|fs| fs.eq_ignore_ascii_case(ps) || self.adjacency.adjacent(ps, fs))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn thresholds() -> SafeguardThresholds {
        SafeguardThresholds::default()
    }

    fn facts() -> SafeguardFacts {
        let year = Utc::now().year();
        SafeguardFacts {
            latest_filing_year: Some(year - 1),
            grant_years: vec![year - 1, year - 2, year - 3],
            profile_states: vec!["VA".to_string()],
            profile_nationwide: false,
            foundation_focus: vec!["VA".to_string(), "MD".to_string()],
        }
    }

    #[test]
    fn clean_facts_raise_nothing() {
        let t = thresholds();
        let adjacency = StateAdjacency::empty();
        let report = Safeguards::new(&t, &adjacency).evaluate(&facts());
        assert!(report.flags.is_empty());
    }

    #[test]
    fn stale_filing_is_a_hard_flag() {
        let t = thresholds();
        let adjacency = StateAdjacency::empty();
        let mut f = facts();
        f.latest_filing_year = Some(Utc::now().year() - 5);
        let report = Safeguards::new(&t, &adjacency).evaluate(&f);
        assert!(report.has_hard_flag());
        assert_eq!(report.hard_flags().next().unwrap().name, "filing_recency");
    }

    #[test]
    fn filing_at_threshold_boundary_is_clean() {
        let t = thresholds();
        let adjacency = StateAdjacency::empty();
        let mut f = facts();
        // Exactly N years old: not yet "more than N years".
        f.latest_filing_year = Some(Utc::now().year() - t.filing_recency_years);
        let report = Safeguards::new(&t, &adjacency).evaluate(&f);
        assert!(!report.flags.iter().any(|fl| fl.name == "filing_recency"));
    }

    #[test]
    fn inactive_foundation_is_hard_sporadic_is_soft() {
        let t = thresholds();
        let adjacency = StateAdjacency::empty();

        let mut inactive = facts();
        inactive.grant_years = vec![Utc::now().year() - 10];
        let report = Safeguards::new(&t, &adjacency).evaluate(&inactive);
        let flag = report.flags.iter().find(|f| f.name == "grant_history").unwrap();
        assert!(flag.hard);

        let mut sporadic = facts();
        sporadic.grant_years = vec![Utc::now().year() - 1];
        let report = Safeguards::new(&t, &adjacency).evaluate(&sporadic);
        let flag = report.flags.iter().find(|f| f.name == "grant_history").unwrap();
        assert!(!flag.hard);
    }

    #[test]
    fn border_proximity_counts_adjacent_states() {
        let t = thresholds();
        let mut map = BTreeMap::new();
        map.insert("VA".to_string(), vec!["NC".to_string()]);
        let adjacency = StateAdjacency::from_map(map);

        let mut f = facts();
        f.profile_states = vec!["NC".to_string()];
        f.foundation_focus = vec!["VA".to_string()];
        let report = Safeguards::new(&t, &adjacency).evaluate(&f);
        assert!(!report.flags.iter().any(|fl| fl.name == "border_proximity"));

        f.profile_states = vec!["CA".to_string()];
        let report = Safeguards::new(&t, &adjacency).evaluate(&f);
        assert!(report.flags.iter().any(|fl| fl.name == "border_proximity" && fl.hard));
    }

    #[test]
    fn national_focus_never_flags_borders() {
        let t = thresholds();
        let adjacency = StateAdjacency::empty();
        let mut f = facts();
        f.foundation_focus = vec![];
        f.profile_states = vec!["HI".to_string()];
        let report = Safeguards::new(&t, &adjacency).evaluate(&f);
        assert!(!report.flags.iter().any(|fl| fl.name == "border_proximity"));
    }
}
