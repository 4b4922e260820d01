//! Foundation-track composite for 990-PF opportunities.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use grantscout_config::{ScoringTables, StateAdjacency};
use grantscout_core::normalize::NteeCode;
use grantscout_core::{AppliedBoost, CompositeScore, DimensionalScore, Profile, Track};

use crate::compose::{compose, AbstainTrigger};
use crate::safeguards::SafeguardReport;

/// Everything the composite needs to know about the foundation, gathered
/// from its filings and enrichment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoundationFacts {
    pub ntee: Option<String>,
    /// States the foundation's giving focuses on; empty means national.
    pub geographic_focus: Vec<String>,
    pub total_assets: Option<f64>,
    /// Representative grant size from Part XV.
    pub typical_grant: Option<f64>,
    pub accepts_applications: Option<bool>,
    pub latest_filing_year: Option<i32>,
    /// Operating foundations run their own programs instead of granting.
    pub is_operating: Option<bool>,
    /// NTEE codes of the top Schedule-I / Part XV recipients.
    pub recipient_ntee_codes: Vec<String>,
    /// Per-area data quality in [0, 1].
    pub data_quality: FoundationDataQuality,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FoundationDataQuality {
    pub mission: f64,
    pub geographic: f64,
    pub financial: f64,
    pub strategic: f64,
    pub timing: f64,
}

impl Default for FoundationDataQuality {
    fn default() -> Self {
        Self {
            mission: 0.8,
            geographic: 0.8,
            financial: 0.8,
            strategic: 0.6,
            timing: 0.8,
        }
    }
}

/// Assets at or above this score full capacity.
const ASSET_CAPACITY_SATURATION: f64 = 5_000_000.0;

/// Grant-to-revenue ratios at or above this score a full financial
/// sub-component (a typical grant covering a sixth of annual revenue is as
/// good as it gets).
const GRANT_RATIO_SATURATION: f64 = 1.0 / 6.0;

pub struct FoundationScorer<'a> {
    tables: &'a ScoringTables,
    adjacency: &'a StateAdjacency,
}

impl<'a> FoundationScorer<'a> {
    pub fn new(tables: &'a ScoringTables, adjacency: &'a StateAdjacency) -> Self {
        Self { tables, adjacency }
    }

    /// Score one foundation opportunity for a profile. Safeguard hard flags
    /// arrive as triggers; the numeric dimensions are computed regardless so
    /// a triaged item still shows its full breakdown.
    pub fn score(
        &self,
        profile: &Profile,
        facts: &FoundationFacts,
        safeguards: &SafeguardReport,
    ) -> CompositeScore {
        let weights = &self.tables.foundation;
        let quality = facts.data_quality;
        let mut triggers = Vec::new();

        // Mission: two-part NTEE match.
        let (mission_raw, alignment_known) = self.mission_alignment(profile, facts);
        match alignment_known {
            false => triggers.push(AbstainTrigger::MissingNteeCodes),
            true if mission_raw < self.tables.min_ntee_alignment => {
                triggers.push(AbstainTrigger::LowNteeAlignment {
                    alignment: mission_raw,
                })
            }
            true => {}
        }

        // Geographic fit.
        let geo_raw = self.geographic_fit(profile, facts);
        if geo_raw == 0.0 {
            triggers.push(AbstainTrigger::GeographicMismatch);
        }

        let financial_raw = self.financial_match(profile, facts);
        let (strategic_raw, coherence) = self.strategic_alignment(profile, facts);
        let timing_raw = self.timing(facts);

        for flag in safeguards.hard_flags() {
            triggers.push(AbstainTrigger::SafeguardFlag {
                name: flag.name.clone(),
            });
        }

        let mut dimensions = vec![
            DimensionalScore::new("mission", mission_raw, weights.mission, quality.mission),
            DimensionalScore::new("geographic", geo_raw, weights.geographic, quality.geographic),
            DimensionalScore::new("financial", financial_raw, weights.financial, quality.financial),
            DimensionalScore::new("strategic", strategic_raw, weights.strategic, quality.strategic),
            DimensionalScore::new("timing", timing_raw, weights.timing, quality.timing),
        ];

        // Recipient coherence confers a boost on the strategic dimension,
        // scaled into the configured 0..0.15 ceiling.
        let mut boosts = Vec::new();
        if coherence > 0.0 {
            let factor = weights.strategic_boost_max * coherence;
            let strategic = &mut dimensions[3];
            let contribution = strategic.raw * strategic.weight * factor;
            *strategic = strategic.clone().boosted(1.0 + factor);
            boosts.push(AppliedBoost {
                name: "recipient_coherence".to_string(),
                dimension: "strategic".to_string(),
                contribution,
            });
        }

        let enhancements = self.enhancement_count(facts);
        compose(
            self.tables,
            None,
            Track::Foundation,
            dimensions,
            boosts,
            triggers,
            enhancements,
        )
    }

    /// (alignment, whether both sides declared codes).
    fn mission_alignment(&self, profile: &Profile, facts: &FoundationFacts) -> (f64, bool) {
        let weights = &self.tables.foundation;
        let profile_codes: Vec<NteeCode> = profile
            .ntee_codes
            .iter()
            .filter_map(|c| NteeCode::parse(c))
            .collect();
        let foundation_code = facts.ntee.as_deref().and_then(NteeCode::parse);

        let (Some(foundation_code), false) = (foundation_code, profile_codes.is_empty()) else {
            return (0.0, false);
        };

        let best = profile_codes
            .iter()
            .map(|code| {
                let major = if code.same_major(&foundation_code) {
                    weights.ntee_major_share
                } else {
                    0.0
                };
                let leaf = if code.same_leaf(&foundation_code) {
                    weights.ntee_leaf_share
                } else {
                    0.0
                };
                (major + leaf).min(1.0)
            })
            .fold(0.0, f64::max);
        (best, true)
    }

    fn geographic_fit(&self, profile: &Profile, facts: &FoundationFacts) -> f64 {
        let weights = &self.tables.foundation;
        if facts.geographic_focus.is_empty() {
            return weights.geo_national_score;
        }
        if profile.geographic_scope.nationwide {
            return weights.geo_national_score;
        }
        let exact = profile.geographic_scope.states.iter().any(|ps| {
            facts
                .geographic_focus
                .iter()
                .any(|fs| fs.eq_ignore_ascii_case(ps))
        });
        if exact {
            return 1.0;
        }
        let adjacent = !self.adjacency.is_empty()
            && profile.geographic_scope.states.iter().any(|ps| {
                facts
                    .geographic_focus
                    .iter()
                    .any(|fs| self.adjacency.adjacent(ps, fs))
            });
        if adjacent {
            weights.geo_adjacent_score
        } else {
            0.0
        }
    }

    /// Asset capacity, grant-to-revenue ratio, and application policy,
    /// weighted 10/10/8 inside the dimension.
    fn financial_match(&self, profile: &Profile, facts: &FoundationFacts) -> f64 {
        let [w_assets, w_ratio, w_open] = self.tables.foundation.financial_subweights;
        let total = w_assets + w_ratio + w_open;
        if total <= 0.0 {
            return 0.0;
        }

        let capacity = facts
            .total_assets
            .map(|assets| (assets / ASSET_CAPACITY_SATURATION).clamp(0.0, 1.0))
            .unwrap_or(0.0);

        let ratio = match (facts.typical_grant, profile.annual_revenue) {
            (Some(grant), Some(revenue)) if revenue > 0.0 => {
                ((grant / revenue) / GRANT_RATIO_SATURATION).clamp(0.0, 1.0)
            }
            _ => 0.0,
        };

        let open = match facts.accepts_applications {
            Some(true) => 1.0,
            Some(false) => 0.0,
            // Unstated policy is worth half: many foundations give without
            // a formal process.
            None => 0.5,
        };

        (w_assets * capacity + w_ratio * ratio + w_open * open) / total
    }

    /// (raw score, coherence in [0, 1]).
    ///
    /// Coherence is one minus the normalized entropy of recipient NTEE
    /// major groups: a foundation granting inside one field is coherent, a
    /// scattershot giver is not. The raw score blends coherence with the
    /// share of recipients in the profile's own major group.
    fn strategic_alignment(&self, profile: &Profile, facts: &FoundationFacts) -> (f64, f64) {
        let top_n = self.tables.foundation.strategic_top_n;
        let codes: Vec<NteeCode> = facts
            .recipient_ntee_codes
            .iter()
            .take(top_n)
            .filter_map(|c| NteeCode::parse(c))
            .collect();
        if codes.is_empty() {
            return (0.0, 0.0);
        }

        let mut counts: std::collections::BTreeMap<char, usize> = std::collections::BTreeMap::new();
        for code in &codes {
            *counts.entry(code.major_group()).or_insert(0) += 1;
        }
        let n = codes.len() as f64;

        let coherence = if counts.len() <= 1 {
            1.0
        } else {
            let entropy: f64 = counts
                .values()
                .map(|count| {
                    let p = *count as f64 / n;
                    -p * p.ln()
                })
                .sum();
            let max_entropy = (counts.len() as f64).ln();
            (1.0 - entropy / max_entropy).clamp(0.0, 1.0)
        };

        let profile_share = profile
            .primary_ntee()
            .and_then(NteeCode::parse)
            .map(|code| {
                counts
                    .get(&code.major_group())
                    .map(|count| *count as f64 / n)
                    .unwrap_or(0.0)
            })
            .unwrap_or(0.0);

        let raw = 0.4 * coherence + 0.6 * profile_share;
        (raw.clamp(0.0, 1.0), coherence)
    }

    /// Recency time-decay plus the operating-vs-grantmaking preference.
    fn timing(&self, facts: &FoundationFacts) -> f64 {
        let Some(year) = facts.latest_filing_year else {
            return 0.0;
        };
        let age = (Utc::now().year() - year).max(0);
        let decayed =
            (1.0 - self.tables.foundation.timing_decay_per_year * f64::from(age)).clamp(0.0, 1.0);
        match facts.is_operating {
            // Operating foundations rarely make external grants.
            Some(true) => decayed * 0.5,
            _ => decayed,
        }
    }

    fn enhancement_count(&self, facts: &FoundationFacts) -> u32 {
        u32::from(facts.total_assets.is_some())
            + u32::from(!facts.recipient_ntee_codes.is_empty())
            + u32::from(facts.latest_filing_year.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantscout_core::{GeographicScope, Recommendation};

    fn profile() -> Profile {
        Profile {
            id: "profile-1".to_string(),
            display_name: "Riverside Learning Alliance".to_string(),
            ein: Some("54-1234567".to_string()),
            mission: "Expand literacy programs across Virginia".to_string(),
            ntee_codes: vec!["B25".to_string()],
            geographic_scope: GeographicScope {
                states: vec!["VA".to_string()],
                nationwide: false,
            },
            focus_areas: vec!["education".to_string()],
            annual_revenue: Some(500_000.0),
            funding_preferences: vec![],
        }
    }

    /// Facts modeled on the reference scenario: B25 foundation in a VA/MD/DC
    /// focus, five million in assets, 25k typical grants, open applications,
    /// filed last year, coherent education-heavy recipient list.
    fn strong_facts() -> FoundationFacts {
        FoundationFacts {
            ntee: Some("B25".to_string()),
            geographic_focus: vec!["VA".to_string(), "MD".to_string(), "DC".to_string()],
            total_assets: Some(5_000_000.0),
            typical_grant: Some(25_000.0),
            accepts_applications: Some(true),
            latest_filing_year: Some(Utc::now().year() - 1),
            is_operating: Some(false),
            recipient_ntee_codes: vec![
                "B25".into(),
                "B25".into(),
                "B21".into(),
                "B28".into(),
                "B25".into(),
                "B24".into(),
                "B25".into(),
                "P20".into(),
                "B25".into(),
                "B29".into(),
            ],
            data_quality: FoundationDataQuality::default(),
        }
    }

    fn scorer<'a>(
        tables: &'a ScoringTables,
        adjacency: &'a StateAdjacency,
    ) -> FoundationScorer<'a> {
        FoundationScorer::new(tables, adjacency)
    }

    #[test]
    fn strong_match_passes_with_expected_dimensions() {
        let tables = ScoringTables::default();
        let adjacency = StateAdjacency::empty();
        let composite = scorer(&tables, &adjacency).score(
            &profile(),
            &strong_facts(),
            &SafeguardReport::default(),
        );

        let dim = |name: &str| composite.dimension(name).unwrap().raw;
        assert!((dim("mission") - 1.0).abs() < 0.02);
        assert!((dim("geographic") - 1.0).abs() < 0.02);
        assert!((dim("financial") - 0.75).abs() < 0.02);
        assert!((dim("timing") - 0.95).abs() < 0.02);
        // Education-dominated recipients: strategic well above the floor.
        assert!(dim("strategic") > 0.5, "strategic raw {}", dim("strategic"));

        assert!(composite.overall > 0.75 && composite.overall < 0.92,
            "overall {}", composite.overall);
        assert_eq!(composite.recommendation, Recommendation::Pass);
        assert_eq!(composite.boosts.len(), 1);
        assert_eq!(composite.boosts[0].name, "recipient_coherence");
        assert!(composite.confidence <= 1.0);
    }

    #[test]
    fn major_only_match_scores_forty_percent() {
        let tables = ScoringTables::default();
        let adjacency = StateAdjacency::empty();
        let mut facts = strong_facts();
        facts.ntee = Some("B99".to_string());
        let composite =
            scorer(&tables, &adjacency).score(&profile(), &facts, &SafeguardReport::default());
        assert!((composite.dimension("mission").unwrap().raw - 0.40).abs() < 1e-9);
    }

    #[test]
    fn missing_ntee_triggers_abstain() {
        let tables = ScoringTables::default();
        let adjacency = StateAdjacency::empty();
        let mut facts = strong_facts();
        facts.ntee = None;
        let composite =
            scorer(&tables, &adjacency).score(&profile(), &facts, &SafeguardReport::default());
        assert_eq!(composite.recommendation, Recommendation::Abstain);
        assert!(composite
            .abstain_reasons
            .iter()
            .any(|r| r.contains("missing NTEE")));
    }

    #[test]
    fn low_alignment_triggers_abstain_even_when_score_passes() {
        let tables = ScoringTables::default();
        let adjacency = StateAdjacency::empty();
        let mut facts = strong_facts();
        // Different major group: alignment 0.0 < 0.20.
        facts.ntee = Some("X20".to_string());
        let composite =
            scorer(&tables, &adjacency).score(&profile(), &facts, &SafeguardReport::default());
        assert_eq!(composite.recommendation, Recommendation::Abstain);
        assert!(composite
            .abstain_reasons
            .iter()
            .any(|r| r.contains("NTEE alignment")));
    }

    #[test]
    fn geographic_mismatch_triggers_and_adjacency_rescues() {
        let tables = ScoringTables::default();

        let empty = StateAdjacency::empty();
        let mut facts = strong_facts();
        facts.geographic_focus = vec!["CA".to_string()];
        let composite =
            scorer(&tables, &empty).score(&profile(), &facts, &SafeguardReport::default());
        assert_eq!(composite.dimension("geographic").unwrap().raw, 0.0);
        assert_eq!(composite.recommendation, Recommendation::Abstain);

        let mut map = std::collections::BTreeMap::new();
        map.insert("VA".to_string(), vec!["NC".to_string()]);
        let table = StateAdjacency::from_map(map);
        facts.geographic_focus = vec!["NC".to_string()];
        let composite =
            scorer(&tables, &table).score(&profile(), &facts, &SafeguardReport::default());
        assert!((composite.dimension("geographic").unwrap().raw - 0.75).abs() < 1e-9);
    }

    #[test]
    fn national_foundation_scores_half_geography() {
        let tables = ScoringTables::default();
        let adjacency = StateAdjacency::empty();
        let mut facts = strong_facts();
        facts.geographic_focus = vec![];
        let composite =
            scorer(&tables, &adjacency).score(&profile(), &facts, &SafeguardReport::default());
        assert!((composite.dimension("geographic").unwrap().raw - 0.5).abs() < 1e-9);
    }

    #[test]
    fn operating_foundation_halves_timing() {
        let tables = ScoringTables::default();
        let adjacency = StateAdjacency::empty();
        let mut facts = strong_facts();
        facts.is_operating = Some(true);
        let composite =
            scorer(&tables, &adjacency).score(&profile(), &facts, &SafeguardReport::default());
        assert!((composite.dimension("timing").unwrap().raw - 0.475).abs() < 1e-9);
    }

    #[test]
    fn safeguard_hard_flag_becomes_trigger() {
        let tables = ScoringTables::default();
        let adjacency = StateAdjacency::empty();
        let report = SafeguardReport {
            flags: vec![crate::safeguards::SafeguardFlag {
                name: "filing_recency".to_string(),
                detail: "stale".to_string(),
                hard: true,
            }],
        };
        let composite = scorer(&tables, &adjacency).score(&profile(), &strong_facts(), &report);
        assert_eq!(composite.recommendation, Recommendation::Abstain);
        assert!(composite
            .abstain_reasons
            .iter()
            .any(|r| r.contains("filing_recency")));
    }
}
