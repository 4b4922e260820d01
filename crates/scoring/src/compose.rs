//! Score composition and recommendation shared by both regimes.

use grantscout_config::ScoringTables;
use grantscout_core::{
    AppliedBoost, CompositeScore, DimensionalScore, Recommendation, ScoringStage, Track,
};

/// A condition that forces Abstain regardless of the numeric score.
#[derive(Debug, Clone, PartialEq)]
pub enum AbstainTrigger {
    MissingNteeCodes,
    LowNteeAlignment { alignment: f64 },
    GeographicMismatch,
    SafeguardFlag { name: String },
}

impl AbstainTrigger {
    pub fn reason(&self) -> String {
        match self {
            AbstainTrigger::MissingNteeCodes => "missing NTEE codes".to_string(),
            AbstainTrigger::LowNteeAlignment { alignment } => {
                format!("NTEE alignment {alignment:.3} below threshold")
            }
            AbstainTrigger::GeographicMismatch => "explicit geographic mismatch".to_string(),
            AbstainTrigger::SafeguardFlag { name } => format!("reliability safeguard: {name}"),
        }
    }
}

/// Fold dimensions, boosts, and triggers into a composite.
///
/// Overall = Σ (raw · weight) + Σ boost contributions, clamped to [0, 1];
/// each dimension's `weighted` already carries its own boost so the two
/// accountings agree. Confidence = mean data quality + 0.05 per available
/// enhancement, clamped.
pub fn compose(
    tables: &ScoringTables,
    stage: Option<ScoringStage>,
    track: Track,
    dimensions: Vec<DimensionalScore>,
    boosts: Vec<AppliedBoost>,
    triggers: Vec<AbstainTrigger>,
    enhancement_count: u32,
) -> CompositeScore {
    let base: f64 = dimensions.iter().map(|d| d.raw * d.weight).sum();
    let boost_total: f64 = boosts.iter().map(|b| b.contribution).sum();
    let overall = (base + boost_total).clamp(0.0, 1.0);

    let mean_quality = if dimensions.is_empty() {
        0.0
    } else {
        dimensions.iter().map(|d| d.data_quality).sum::<f64>() / dimensions.len() as f64
    };
    let confidence =
        (mean_quality + f64::from(enhancement_count) * 0.05).clamp(0.0, 1.0);

    let recommendation = if !triggers.is_empty() {
        Recommendation::Abstain
    } else if overall >= tables.pass_threshold {
        Recommendation::Pass
    } else if overall < tables.fail_threshold {
        Recommendation::Fail
    } else {
        Recommendation::Abstain
    };

    CompositeScore {
        overall,
        confidence,
        dimensions,
        stage,
        track,
        boosts,
        recommendation,
        abstain_reasons: triggers.iter().map(AbstainTrigger::reason).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> ScoringTables {
        ScoringTables::default()
    }

    fn dims(overall_target: f64) -> Vec<DimensionalScore> {
        // One full-weight dimension makes the overall equal the raw value.
        vec![DimensionalScore::new("only", overall_target, 1.0, 0.8)]
    }

    #[test]
    fn threshold_boundaries() {
        let t = tables();
        let score = |v| compose(&t, None, Track::Foundation, dims(v), vec![], vec![], 0);
        assert_eq!(score(0.5800).recommendation, Recommendation::Pass);
        assert_eq!(score(0.5799).recommendation, Recommendation::Abstain);
        assert_eq!(score(0.4500).recommendation, Recommendation::Abstain);
        assert_eq!(score(0.4499).recommendation, Recommendation::Fail);
    }

    #[test]
    fn triggers_force_abstain_at_any_score() {
        let t = tables();
        let composite = compose(
            &t,
            None,
            Track::Foundation,
            dims(0.95),
            vec![],
            vec![AbstainTrigger::GeographicMismatch],
            0,
        );
        assert_eq!(composite.recommendation, Recommendation::Abstain);
        assert!(!composite.abstain_reasons.is_empty());
    }

    #[test]
    fn overall_is_clamped_and_boosts_add() {
        let t = tables();
        let boost = AppliedBoost {
            name: "network_data".into(),
            dimension: "only".into(),
            contribution: 0.5,
        };
        let composite = compose(&t, None, Track::Nonprofit, dims(0.9), vec![boost], vec![], 0);
        assert!((composite.overall - 1.0).abs() < 1e-9);
    }

    #[test]
    fn confidence_counts_enhancements() {
        let t = tables();
        let base = compose(&t, None, Track::Nonprofit, dims(0.5), vec![], vec![], 0);
        let enhanced = compose(&t, None, Track::Nonprofit, dims(0.5), vec![], vec![], 2);
        assert!((enhanced.confidence - base.confidence - 0.10).abs() < 1e-9);
        assert!(enhanced.confidence <= 1.0);
    }
}
