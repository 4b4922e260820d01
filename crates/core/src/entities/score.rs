//! Dimensional and composite score representations.
//!
//! Both scoring regimes (stage-based and foundation-track) flatten into the
//! same per-dimension values so downstream consumers never branch on the
//! regime that produced a score.

use serde::{Deserialize, Serialize};

/// Funnel position of a scoring pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStage {
    Discover,
    Plan,
    Analyze,
    Examine,
    Approach,
}

impl ScoringStage {
    pub const ALL: [ScoringStage; 5] = [
        ScoringStage::Discover,
        ScoringStage::Plan,
        ScoringStage::Analyze,
        ScoringStage::Examine,
        ScoringStage::Approach,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringStage::Discover => "discover",
            ScoringStage::Plan => "plan",
            ScoringStage::Analyze => "analyze",
            ScoringStage::Examine => "examine",
            ScoringStage::Approach => "approach",
        }
    }
}

/// Opportunity source class, orthogonal to the stage axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    Nonprofit,
    Federal,
    State,
    Commercial,
    /// 990-PF opportunities scored by the single-pass foundation composite.
    Foundation,
}

impl Track {
    pub fn as_str(&self) -> &'static str {
        match self {
            Track::Nonprofit => "nonprofit",
            Track::Federal => "federal",
            Track::State => "state",
            Track::Commercial => "commercial",
            Track::Foundation => "foundation",
        }
    }
}

/// One scored dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionalScore {
    pub dimension: String,
    /// Raw score in [0, 1] before weighting.
    pub raw: f64,
    pub weight: f64,
    /// raw * weight * boost, as summed into the composite.
    pub weighted: f64,
    /// Quality of the data backing this dimension, in [0, 1].
    pub data_quality: f64,
    pub notes: Option<String>,
}

impl DimensionalScore {
    pub fn new(dimension: impl Into<String>, raw: f64, weight: f64, data_quality: f64) -> Self {
        let raw = raw.clamp(0.0, 1.0);
        Self {
            dimension: dimension.into(),
            raw,
            weight,
            weighted: raw * weight,
            data_quality: data_quality.clamp(0.0, 1.0),
            notes: None,
        }
    }

    /// Apply a multiplicative boost factor to the weighted value.
    pub fn boosted(mut self, factor: f64) -> Self {
        self.weighted = self.raw * self.weight * factor;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes = Some(note.into());
        self
    }
}

/// A boost applied during composition, retained for explainability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedBoost {
    pub name: String,
    pub dimension: String,
    /// Additional weighted contribution the boost produced.
    pub contribution: f64,
}

/// Final decision attached to a composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Pass,
    Abstain,
    Fail,
}

/// Composite score over one opportunity for one stage or track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    /// Overall in [0, 1]: sum of weighted dimensions plus applied boosts.
    pub overall: f64,
    /// Confidence in [0, 1] derived from data quality and enhancements.
    pub confidence: f64,
    pub dimensions: Vec<DimensionalScore>,
    pub stage: Option<ScoringStage>,
    pub track: Track,
    pub boosts: Vec<AppliedBoost>,
    pub recommendation: Recommendation,
    /// Why the recommendation was forced to Abstain, when it was.
    #[serde(default)]
    pub abstain_reasons: Vec<String>,
}

impl CompositeScore {
    /// Mean data quality across dimensions; 0 when empty.
    pub fn mean_data_quality(&self) -> f64 {
        if self.dimensions.is_empty() {
            return 0.0;
        }
        self.dimensions.iter().map(|d| d.data_quality).sum::<f64>() / self.dimensions.len() as f64
    }

    pub fn dimension(&self, name: &str) -> Option<&DimensionalScore> {
        self.dimensions.iter().find(|d| d.dimension == name)
    }
}
