//! Core traits and types for grantscout
//!
//! This crate provides the foundation used across all other crates:
//! - The tool contract (metadata, capability classes, execution trait)
//! - The invocation context (cost gate, store handle, cancellation, deadline)
//! - The error taxonomy consumed by the workflow engine
//! - Domain entities (profiles, opportunities, filings, scores, triage)
//! - Deterministic normalization utilities
//! - Fingerprinting for the tool-result cache

pub mod context;
pub mod entities;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod normalize;
pub mod tool;

pub use context::{CancelSignal, CostGate, IntelligenceStore, ToolContext};
pub use entities::{
    AmountRange, AppliedBoost, CompositeScore, DimensionalScore, Filing, FilingKey,
    FinancialSummary, FormKind, GeographicScope, GovernanceIndicator, Grant, Investment, Officer,
    Opportunity, ParseQuality, Profile, Recommendation, ScoringStage, SourceChannel, Track,
    TriageDecision, TriageItem, TriageStatus,
};
pub use error::{ErrorKind, Result, ToolError};
pub use fingerprint::Fingerprint;
pub use tool::{Capability, CostModel, Tool, ToolMetadata, ToolResult};
