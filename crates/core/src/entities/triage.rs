//! Manual-review queue items for borderline scoring outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageStatus {
    Queued,
    InReview,
    Decided,
    Escalated,
    Expired,
}

/// Outcome recorded when a reviewer decides a triage item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageDecision {
    Approved,
    Rejected,
    NeedsMoreData { notes: String },
}

/// An opportunity parked for human review: composite in the abstain band or
/// an abstain trigger fired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageItem {
    pub opportunity_id: String,
    /// Workflow run that enqueued the item; dedup key together with the
    /// opportunity id.
    pub run_id: String,
    pub overall: f64,
    pub data_quality: f64,
    pub amount: Option<f64>,
    /// Normalized weighted combination of proximity-to-pass, data quality,
    /// and opportunity amount.
    pub priority: f64,
    pub reasons: Vec<String>,
    pub status: TriageStatus,
    pub decision: Option<TriageDecision>,
    pub assignee: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

impl TriageItem {
    /// Dedup key: one entry per (run, opportunity).
    pub fn dedup_key(&self) -> (String, String) {
        (self.run_id.clone(), self.opportunity_id.clone())
    }
}
