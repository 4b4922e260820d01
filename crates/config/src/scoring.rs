//! Scoring domain tables.
//!
//! Weights, boosts, thresholds, and safeguard knobs live here rather than in
//! the scoring engines so a deployment can re-tune them from YAML without a
//! rebuild. `ScoringTables::default()` carries the production defaults;
//! `load_yaml` applies an override file; `validate` fails startup on any
//! table that breaks the weight-sum or threshold invariants.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use grantscout_core::ScoringStage;

use crate::ConfigError;

/// Tolerance for weight sums.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Weighted dimension list for one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageWeights {
    /// Dimension name → weight; iteration order is stable (BTreeMap) so
    /// score output is deterministic.
    pub dimensions: BTreeMap<String, f64>,
}

impl StageWeights {
    fn of(pairs: &[(&str, f64)]) -> Self {
        Self {
            dimensions: pairs.iter().map(|(n, w)| (n.to_string(), *w)).collect(),
        }
    }

    pub fn sum(&self) -> f64 {
        self.dimensions.values().sum()
    }
}

/// Multiplicative boost factors. Each applies to a named set of dimensions
/// and is capped at +15%.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostFactors {
    /// Boost name → (factor above 1.0, dimensions it applies to).
    pub boosts: BTreeMap<String, BoostRule>,
    /// Hard cap on any single factor.
    #[serde(default = "default_boost_cap")]
    pub max_factor: f64,
}

fn default_boost_cap() -> f64 {
    0.15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostRule {
    /// Fractional uplift, e.g. 0.10 for +10%.
    pub factor: f64,
    pub dimensions: Vec<String>,
}

impl Default for BoostFactors {
    fn default() -> Self {
        let mut boosts = BTreeMap::new();
        boosts.insert(
            "financial_data".to_string(),
            BoostRule {
                factor: 0.10,
                dimensions: vec!["financial".into(), "financial-viability".into()],
            },
        );
        boosts.insert(
            "network_data".to_string(),
            BoostRule {
                factor: 0.15,
                dimensions: vec!["network-leverage".into(), "relationships".into()],
            },
        );
        boosts.insert(
            "historical_data".to_string(),
            BoostRule {
                factor: 0.12,
                dimensions: vec!["success-probability".into(), "success".into()],
            },
        );
        boosts.insert(
            "risk_assessment".to_string(),
            BoostRule {
                factor: 0.08,
                dimensions: vec!["viability".into()],
            },
        );
        Self {
            boosts,
            max_factor: default_boost_cap(),
        }
    }
}

/// Foundation-track (990-PF) composite weights and sub-component knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundationWeights {
    pub mission: f64,
    pub geographic: f64,
    pub financial: f64,
    pub strategic: f64,
    pub timing: f64,

    /// NTEE two-part match split: major group share and leaf share.
    #[serde(default = "default_ntee_major_share")]
    pub ntee_major_share: f64,
    #[serde(default = "default_ntee_leaf_share")]
    pub ntee_leaf_share: f64,

    /// Geographic sub-scores.
    #[serde(default = "default_geo_adjacent")]
    pub geo_adjacent_score: f64,
    #[serde(default = "default_geo_national")]
    pub geo_national_score: f64,

    /// Financial sub-component weights (asset capacity, grant-to-revenue
    /// ratio, applications-open policy). Normalized within the dimension.
    #[serde(default = "default_financial_subweights")]
    pub financial_subweights: [f64; 3],

    /// Strategic-coherence boost ceiling conferred by Schedule-I entropy.
    #[serde(default = "default_strategic_boost_max")]
    pub strategic_boost_max: f64,

    /// Recipients considered by the coherence entropy.
    #[serde(default = "default_strategic_top_n")]
    pub strategic_top_n: usize,

    /// Timing decay per year since the most recent filing.
    #[serde(default = "default_timing_decay")]
    pub timing_decay_per_year: f64,

    /// Confidence uplift per available enhancement.
    #[serde(default = "default_enhancement_bonus")]
    pub enhancement_confidence_bonus: f64,
}

fn default_ntee_major_share() -> f64 {
    0.40
}

fn default_ntee_leaf_share() -> f64 {
    0.60
}

fn default_geo_adjacent() -> f64 {
    0.75
}

fn default_geo_national() -> f64 {
    0.50
}

fn default_financial_subweights() -> [f64; 3] {
    [10.0, 10.0, 8.0]
}

fn default_strategic_boost_max() -> f64 {
    0.15
}

fn default_strategic_top_n() -> usize {
    20
}

fn default_timing_decay() -> f64 {
    0.05
}

fn default_enhancement_bonus() -> f64 {
    0.05
}

impl Default for FoundationWeights {
    fn default() -> Self {
        Self {
            mission: 0.30,
            geographic: 0.20,
            financial: 0.28,
            strategic: 0.12,
            timing: 0.10,
            ntee_major_share: default_ntee_major_share(),
            ntee_leaf_share: default_ntee_leaf_share(),
            geo_adjacent_score: default_geo_adjacent(),
            geo_national_score: default_geo_national(),
            financial_subweights: default_financial_subweights(),
            strategic_boost_max: default_strategic_boost_max(),
            strategic_top_n: default_strategic_top_n(),
            timing_decay_per_year: default_timing_decay(),
            enhancement_confidence_bonus: default_enhancement_bonus(),
        }
    }
}

impl FoundationWeights {
    pub fn sum(&self) -> f64 {
        self.mission + self.geographic + self.financial + self.strategic + self.timing
    }
}

/// Triage priority = normalized weighted combination of proximity to the
/// pass threshold, data quality, and opportunity amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriagePriorityWeights {
    pub proximity: f64,
    pub data_quality: f64,
    pub amount: f64,
    /// Amount producing a full amount sub-score.
    #[serde(default = "default_amount_saturation")]
    pub amount_saturation: f64,
}

fn default_amount_saturation() -> f64 {
    1_000_000.0
}

impl Default for TriagePriorityWeights {
    fn default() -> Self {
        Self {
            proximity: 0.5,
            data_quality: 0.3,
            amount: 0.2,
            amount_saturation: default_amount_saturation(),
        }
    }
}

impl TriagePriorityWeights {
    pub fn sum(&self) -> f64 {
        self.proximity + self.data_quality + self.amount
    }
}

/// Reliability safeguard thresholds. Defaults are the most conservative
/// values observed in operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeguardThresholds {
    /// A most-recent filing older than this raises the recency flag.
    #[serde(default = "default_recency_years")]
    pub filing_recency_years: i32,

    /// Fewer grant years than this within the lookback marks a foundation
    /// sporadic.
    #[serde(default = "default_min_grant_years")]
    pub min_grant_years: usize,

    /// Lookback window for the grant-history check.
    #[serde(default = "default_lookback_years")]
    pub grant_history_lookback_years: i32,
}

fn default_recency_years() -> i32 {
    3
}

fn default_min_grant_years() -> usize {
    2
}

fn default_lookback_years() -> i32 {
    5
}

impl Default for SafeguardThresholds {
    fn default() -> Self {
        Self {
            filing_recency_years: default_recency_years(),
            min_grant_years: default_min_grant_years(),
            grant_history_lookback_years: default_lookback_years(),
        }
    }
}

/// The complete scoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringTables {
    /// Stage → dimension weights.
    pub stages: BTreeMap<String, StageWeights>,

    #[serde(default)]
    pub boosts: BoostFactors,

    #[serde(default)]
    pub foundation: FoundationWeights,

    #[serde(default)]
    pub triage: TriagePriorityWeights,

    #[serde(default)]
    pub safeguards: SafeguardThresholds,

    /// Officer indicators that each add 0.05 influence.
    #[serde(default = "default_influence_flags")]
    pub influence_flags: Vec<String>,

    /// Recommendation thresholds.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,
    #[serde(default = "default_fail_threshold")]
    pub fail_threshold: f64,

    /// NTEE alignment below this forces Abstain.
    #[serde(default = "default_ntee_trigger")]
    pub min_ntee_alignment: f64,
}

fn default_influence_flags() -> Vec<String> {
    vec!["is_voting_member".to_string(), "is_policy_maker".to_string()]
}

fn default_pass_threshold() -> f64 {
    0.58
}

fn default_fail_threshold() -> f64 {
    0.45
}

fn default_ntee_trigger() -> f64 {
    0.20
}

impl Default for ScoringTables {
    fn default() -> Self {
        let mut stages = BTreeMap::new();
        stages.insert(
            ScoringStage::Discover.as_str().to_string(),
            StageWeights::of(&[
                ("mission", 0.30),
                ("geographic", 0.25),
                ("financial", 0.20),
                ("eligibility", 0.15),
                ("timing", 0.10),
            ]),
        );
        stages.insert(
            ScoringStage::Plan.as_str().to_string(),
            StageWeights::of(&[
                ("success-probability", 0.30),
                ("capacity", 0.25),
                ("financial-viability", 0.20),
                ("network-leverage", 0.15),
                ("compliance", 0.10),
            ]),
        );
        stages.insert(
            ScoringStage::Analyze.as_str().to_string(),
            StageWeights::of(&[
                ("competitive", 0.30),
                ("strategic", 0.25),
                ("risk", 0.20),
                ("feasibility", 0.15),
                ("roi", 0.10),
            ]),
        );
        stages.insert(
            ScoringStage::Examine.as_str().to_string(),
            StageWeights::of(&[
                ("depth-quality", 0.30),
                ("relationships", 0.25),
                ("strategic-fit", 0.20),
                ("partnership", 0.15),
                ("innovation", 0.10),
            ]),
        );
        stages.insert(
            ScoringStage::Approach.as_str().to_string(),
            StageWeights::of(&[
                ("viability", 0.30),
                ("success", 0.25),
                ("strategic", 0.20),
                ("resources", 0.15),
                ("timeline", 0.10),
            ]),
        );

        Self {
            stages,
            boosts: BoostFactors::default(),
            foundation: FoundationWeights::default(),
            triage: TriagePriorityWeights::default(),
            safeguards: SafeguardThresholds::default(),
            influence_flags: default_influence_flags(),
            pass_threshold: default_pass_threshold(),
            fail_threshold: default_fail_threshold(),
            min_ntee_alignment: default_ntee_trigger(),
        }
    }
}

impl ScoringTables {
    /// Load an override file on top of the defaults.
    pub fn load_yaml(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let tables: ScoringTables =
            serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        tables.validate()?;
        Ok(tables)
    }

    pub fn stage(&self, stage: ScoringStage) -> Option<&StageWeights> {
        self.stages.get(stage.as_str())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for stage in ScoringStage::ALL {
            let Some(weights) = self.stage(stage) else {
                return Err(ConfigError::invalid(
                    format!("stages.{}", stage.as_str()),
                    "stage weight table missing",
                ));
            };
            if weights.dimensions.len() != 5 {
                return Err(ConfigError::invalid(
                    format!("stages.{}", stage.as_str()),
                    format!("expected 5 dimensions, found {}", weights.dimensions.len()),
                ));
            }
            if (weights.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                return Err(ConfigError::invalid(
                    format!("stages.{}", stage.as_str()),
                    format!("dimension weights sum to {}, expected 1.0", weights.sum()),
                ));
            }
        }

        if (self.foundation.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::invalid(
                "foundation",
                format!("dimension weights sum to {}, expected 1.0", self.foundation.sum()),
            ));
        }
        let share_sum = self.foundation.ntee_major_share + self.foundation.ntee_leaf_share;
        if (share_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::invalid(
                "foundation.ntee_major_share",
                "major and leaf shares must sum to 1.0",
            ));
        }

        for (name, rule) in &self.boosts.boosts {
            if rule.factor < 0.0 || rule.factor > self.boosts.max_factor {
                return Err(ConfigError::invalid(
                    format!("boosts.{name}"),
                    format!(
                        "factor {} outside [0, {}]",
                        rule.factor, self.boosts.max_factor
                    ),
                ));
            }
        }

        if self.triage.sum() <= 0.0 {
            return Err(ConfigError::invalid(
                "triage",
                "priority weights must sum to a positive value",
            ));
        }

        if self.fail_threshold >= self.pass_threshold {
            return Err(ConfigError::invalid(
                "fail_threshold",
                "fail threshold must be below the pass threshold",
            ));
        }

        Ok(())
    }
}
