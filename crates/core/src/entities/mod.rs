//! Core domain entities shared across crates.

pub mod filing;
pub mod opportunity;
pub mod profile;
pub mod score;
pub mod triage;

pub use filing::{
    Filing, FilingKey, FinancialSummary, FormKind, GovernanceIndicator, Grant, Investment, Officer,
    ParseQuality,
};
pub use opportunity::{AmountRange, Opportunity, SourceChannel};
pub use profile::{GeographicScope, Profile};
pub use score::{
    AppliedBoost, CompositeScore, DimensionalScore, Recommendation, ScoringStage, Track,
};
pub use triage::{TriageDecision, TriageItem, TriageStatus};
