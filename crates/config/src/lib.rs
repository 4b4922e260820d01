//! Settings and scoring configuration for grantscout
//!
//! Two layers:
//! - [`Settings`]: process configuration (budget caps, concurrency, TTLs,
//!   rate limits, paths) loaded from `config/default.toml` plus
//!   `GRANTSCOUT_*` environment variables.
//! - [`ScoringTables`]: the scoring domain tables (stage weights, boosts,
//!   foundation-track weights, triage priorities, safeguard thresholds)
//!   with coded defaults and an optional YAML override file.
//!
//! Both are loaded once at startup, validated loudly, and treated as
//! read-only afterwards.

pub mod adjacency;
pub mod scoring;
pub mod settings;

pub use adjacency::StateAdjacency;
pub use scoring::{
    BoostFactors, FoundationWeights, SafeguardThresholds, ScoringTables, StageWeights,
    TriagePriorityWeights,
};
pub use settings::{
    BudgetSettings, CacheSettings, ConcurrencySettings, InferenceSettings, PathSettings,
    RateLimitSettings, RetrySettings, Settings,
};

/// Configuration loading or validation failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}
