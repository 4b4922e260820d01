//! Scoring engines
//!
//! Two regimes over one dimensional representation: stage-based scoring for
//! the Discover → Approach funnel, and the single-pass foundation-track
//! composite for 990-PF opportunities. Both flatten into per-dimension
//! strategy values, compose through the same recommendation logic, and feed
//! the triage queue when the outcome is borderline. Reliability safeguards
//! are a separate module whose hard flags force Abstain.

mod compose;
mod foundation;
mod safeguards;
mod stage;
mod triage;

pub use compose::{compose, AbstainTrigger};
pub use foundation::{FoundationDataQuality, FoundationFacts, FoundationScorer};
pub use safeguards::{SafeguardFacts, SafeguardFlag, SafeguardReport, Safeguards};
pub use stage::{DimensionInput, DimensionInputs, Enhancements, StageScorer};
pub use triage::build_triage_item;
