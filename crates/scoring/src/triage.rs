//! Triage item construction.

use chrono::Utc;

use grantscout_config::ScoringTables;
use grantscout_core::{CompositeScore, Recommendation, TriageItem, TriageStatus};

/// Build the triage item for an abstained opportunity.
///
/// Priority is the normalized weighted combination of proximity to the pass
/// threshold, data quality, and opportunity amount: the closer a borderline
/// opportunity sits to passing, the sooner a reviewer should see it.
/// Returns `None` for Pass and Fail outcomes, which never enter the queue.
pub fn build_triage_item(
    tables: &ScoringTables,
    run_id: &str,
    opportunity_id: &str,
    score: &CompositeScore,
    amount: Option<f64>,
) -> Option<TriageItem> {
    if score.recommendation != Recommendation::Abstain {
        return None;
    }

    let weights = &tables.triage;
    let total = weights.sum();

    let proximity = 1.0 - ((tables.pass_threshold - score.overall).abs() / tables.pass_threshold);
    let proximity = proximity.clamp(0.0, 1.0);
    let data_quality = score.mean_data_quality();
    let amount_score = amount
        .map(|a| (a / weights.amount_saturation).clamp(0.0, 1.0))
        .unwrap_or(0.0);

    let priority = (weights.proximity * proximity
        + weights.data_quality * data_quality
        + weights.amount * amount_score)
        / total;

    let mut reasons = score.abstain_reasons.clone();
    if reasons.is_empty() {
        reasons.push(format!(
            "composite {:.4} inside abstain band [{}, {})",
            score.overall, tables.fail_threshold, tables.pass_threshold
        ));
    }

    Some(TriageItem {
        opportunity_id: opportunity_id.to_string(),
        run_id: run_id.to_string(),
        overall: score.overall,
        data_quality,
        amount,
        priority,
        reasons,
        status: TriageStatus::Queued,
        decision: None,
        assignee: None,
        enqueued_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantscout_core::{DimensionalScore, Track};

    fn abstained(overall: f64, quality: f64) -> CompositeScore {
        CompositeScore {
            overall,
            confidence: quality,
            dimensions: vec![DimensionalScore::new("only", overall, 1.0, quality)],
            stage: None,
            track: Track::Foundation,
            boosts: vec![],
            recommendation: Recommendation::Abstain,
            abstain_reasons: vec![],
        }
    }

    #[test]
    fn pass_and_fail_never_enter_the_queue() {
        let tables = ScoringTables::default();
        let mut passed = abstained(0.9, 0.9);
        passed.recommendation = Recommendation::Pass;
        assert!(build_triage_item(&tables, "run", "opp", &passed, None).is_none());

        let mut failed = abstained(0.1, 0.9);
        failed.recommendation = Recommendation::Fail;
        assert!(build_triage_item(&tables, "run", "opp", &failed, None).is_none());
    }

    #[test]
    fn closer_to_pass_means_higher_priority() {
        let tables = ScoringTables::default();
        let near = build_triage_item(&tables, "run", "a", &abstained(0.57, 0.8), Some(50_000.0))
            .unwrap();
        let far = build_triage_item(&tables, "run", "b", &abstained(0.46, 0.8), Some(50_000.0))
            .unwrap();
        assert!(near.priority > far.priority);
    }

    #[test]
    fn amount_raises_priority_up_to_saturation() {
        let tables = ScoringTables::default();
        let small =
            build_triage_item(&tables, "run", "a", &abstained(0.5, 0.8), Some(10_000.0)).unwrap();
        let large =
            build_triage_item(&tables, "run", "b", &abstained(0.5, 0.8), Some(2_000_000.0))
                .unwrap();
        assert!(large.priority > small.priority);
        assert!(large.priority <= 1.0);
    }

    #[test]
    fn band_reason_is_synthesized_when_no_trigger_fired() {
        let tables = ScoringTables::default();
        let item =
            build_triage_item(&tables, "run", "a", &abstained(0.50, 0.8), None).unwrap();
        assert_eq!(item.reasons.len(), 1);
        assert!(item.reasons[0].contains("abstain band"));
        assert_eq!(item.status, TriageStatus::Queued);
    }
}
