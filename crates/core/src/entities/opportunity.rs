//! Grant solicitations and foundations under evaluation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::score::CompositeScore;

/// Which channel surfaced the opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceChannel {
    Federal,
    State,
    Foundation,
    Commercial,
}

/// Announced award size, either bound optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl AmountRange {
    /// Midpoint when both bounds are known, otherwise whichever exists.
    pub fn representative(&self) -> Option<f64> {
        match (self.min, self.max) {
            (Some(lo), Some(hi)) => Some((lo + hi) / 2.0),
            (Some(lo), None) => Some(lo),
            (None, Some(hi)) => Some(hi),
            (None, None) => None,
        }
    }
}

/// A grant solicitation or foundation. Created by discovery; mutated only by
/// appending scored results as it moves through the funnel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub channel: SourceChannel,
    pub sponsor_ein: Option<String>,
    pub title: String,
    pub amount: AmountRange,
    pub deadlines: Vec<NaiveDate>,
    pub keywords: Vec<String>,
    /// Verbatim payload from the source channel.
    pub raw: Value,
    /// Append-only stage transitions.
    #[serde(default)]
    pub scored: Vec<ScoredStage>,
}

/// One scored stage transition, appended when a scoring pass completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredStage {
    pub score: CompositeScore,
    pub scored_at: DateTime<Utc>,
}

impl Opportunity {
    /// Append a stage result. Existing entries are never rewritten.
    pub fn push_score(&mut self, score: CompositeScore) {
        self.scored.push(ScoredStage {
            score,
            scored_at: Utc::now(),
        });
    }

    pub fn latest_score(&self) -> Option<&CompositeScore> {
        self.scored.last().map(|s| &s.score)
    }
}
