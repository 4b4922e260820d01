//! Stage-based scoring for the Discover → Approach funnel.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use grantscout_config::ScoringTables;
use grantscout_core::{AppliedBoost, CompositeScore, DimensionalScore, ScoringStage, Track};

use crate::compose::{compose, AbstainTrigger};

/// Raw score and backing data quality for one dimension, as produced by an
/// assessment pass (inference or deterministic analysis).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DimensionInput {
    pub raw: f64,
    pub data_quality: f64,
}

/// Dimension name → input. Deterministic iteration keeps score output
/// stable for the fingerprint cache.
pub type DimensionInputs = BTreeMap<String, DimensionInput>;

/// Which enhancement data sets were available to the assessment. Each one
/// unlocks its boost and raises confidence.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Enhancements {
    pub financial_data: bool,
    pub network_data: bool,
    pub historical_data: bool,
    pub risk_assessment: bool,
}

impl Enhancements {
    pub fn count(&self) -> u32 {
        u32::from(self.financial_data)
            + u32::from(self.network_data)
            + u32::from(self.historical_data)
            + u32::from(self.risk_assessment)
    }

    fn is_available(&self, boost_name: &str) -> bool {
        match boost_name {
            "financial_data" => self.financial_data,
            "network_data" => self.network_data,
            "historical_data" => self.historical_data,
            "risk_assessment" => self.risk_assessment,
            _ => false,
        }
    }
}

/// Evaluates the five weighted dimensions of one stage.
pub struct StageScorer<'a> {
    tables: &'a ScoringTables,
}

impl<'a> StageScorer<'a> {
    pub fn new(tables: &'a ScoringTables) -> Self {
        Self { tables }
    }

    /// Score one stage. A dimension with no input scores zero with zero
    /// data quality; absent evidence is not neutral evidence.
    pub fn score(
        &self,
        stage: ScoringStage,
        track: Track,
        inputs: &DimensionInputs,
        enhancements: Enhancements,
        triggers: Vec<AbstainTrigger>,
    ) -> CompositeScore {
        let weights = self
            .tables
            .stage(stage)
            .expect("scoring tables validated at startup");

        let mut dimensions = Vec::with_capacity(weights.dimensions.len());
        let mut applied = Vec::new();

        for (name, weight) in &weights.dimensions {
            let input = inputs.get(name).copied().unwrap_or(DimensionInput {
                raw: 0.0,
                data_quality: 0.0,
            });
            let mut score = DimensionalScore::new(name.clone(), input.raw, *weight, input.data_quality);
            if !inputs.contains_key(name) {
                score = score.with_note("no assessment input");
            }

            // At most one boost rule names a dimension; the factor itself is
            // capped by table validation.
            if let Some((boost_name, rule)) = self
                .tables
                .boosts
                .boosts
                .iter()
                .find(|(boost_name, rule)| {
                    rule.dimensions.iter().any(|d| d == name)
                        && enhancements.is_available(boost_name)
                })
            {
                let contribution = score.raw * score.weight * rule.factor;
                score = score.boosted(1.0 + rule.factor);
                applied.push(AppliedBoost {
                    name: boost_name.clone(),
                    dimension: name.clone(),
                    contribution,
                });
            }

            dimensions.push(score);
        }

        compose(
            self.tables,
            Some(stage),
            track,
            dimensions,
            applied,
            triggers,
            enhancements.count(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(pairs: &[(&str, f64)]) -> DimensionInputs {
        pairs
            .iter()
            .map(|(name, raw)| {
                (
                    name.to_string(),
                    DimensionInput {
                        raw: *raw,
                        data_quality: 0.9,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn discover_stage_weighted_sum() {
        let tables = ScoringTables::default();
        let scorer = StageScorer::new(&tables);
        let composite = scorer.score(
            ScoringStage::Discover,
            Track::Nonprofit,
            &inputs(&[
                ("mission", 1.0),
                ("geographic", 1.0),
                ("financial", 0.5),
                ("eligibility", 1.0),
                ("timing", 0.0),
            ]),
            Enhancements::default(),
            vec![],
        );

        // 0.30 + 0.25 + 0.10 + 0.15 + 0.0
        assert!((composite.overall - 0.80).abs() < 1e-9);
        assert_eq!(composite.dimensions.len(), 5);
        assert_eq!(composite.recommendation, grantscout_core::Recommendation::Pass);
    }

    #[test]
    fn missing_dimension_scores_zero_with_note() {
        let tables = ScoringTables::default();
        let scorer = StageScorer::new(&tables);
        let composite = scorer.score(
            ScoringStage::Discover,
            Track::Federal,
            &inputs(&[("mission", 1.0)]),
            Enhancements::default(),
            vec![],
        );

        let timing = composite.dimension("timing").unwrap();
        assert_eq!(timing.raw, 0.0);
        assert_eq!(timing.data_quality, 0.0);
        assert!(timing.notes.is_some());
    }

    #[test]
    fn financial_boost_applies_only_when_available() {
        let tables = ScoringTables::default();
        let scorer = StageScorer::new(&tables);
        let base_inputs = inputs(&[("financial", 1.0)]);

        let without = scorer.score(
            ScoringStage::Discover,
            Track::Nonprofit,
            &base_inputs,
            Enhancements::default(),
            vec![],
        );
        let with = scorer.score(
            ScoringStage::Discover,
            Track::Nonprofit,
            &base_inputs,
            Enhancements {
                financial_data: true,
                ..Enhancements::default()
            },
            vec![],
        );

        // +10% on the 0.20-weight financial dimension.
        assert!((with.overall - without.overall - 0.02).abs() < 1e-9);
        assert_eq!(with.boosts.len(), 1);
        assert_eq!(with.boosts[0].dimension, "financial");
        let boosted = with.dimension("financial").unwrap();
        assert!((boosted.weighted - 0.22).abs() < 1e-9);
    }

    #[test]
    fn network_boost_targets_plan_stage_dimension() {
        let tables = ScoringTables::default();
        let scorer = StageScorer::new(&tables);
        let composite = scorer.score(
            ScoringStage::Plan,
            Track::Nonprofit,
            &inputs(&[("network-leverage", 1.0)]),
            Enhancements {
                network_data: true,
                ..Enhancements::default()
            },
            vec![],
        );
        // 0.15 weight boosted 15%.
        assert!((composite.overall - 0.15 * 1.15).abs() < 1e-9);
    }

    #[test]
    fn every_stage_composes_in_bounds() {
        let tables = ScoringTables::default();
        let scorer = StageScorer::new(&tables);
        let all = Enhancements {
            financial_data: true,
            network_data: true,
            historical_data: true,
            risk_assessment: true,
        };
        for stage in ScoringStage::ALL {
            let full: DimensionInputs = tables
                .stage(stage)
                .unwrap()
                .dimensions
                .keys()
                .map(|name| {
                    (
                        name.clone(),
                        DimensionInput {
                            raw: 1.0,
                            data_quality: 1.0,
                        },
                    )
                })
                .collect();
            let composite = scorer.score(stage, Track::State, &full, all, vec![]);
            assert!(composite.overall <= 1.0);
            assert!(composite.overall > 0.99);
            assert!(composite.confidence <= 1.0);
        }
    }
}
