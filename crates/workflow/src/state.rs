//! Step and run state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use grantscout_core::ErrorKind;

/// Step lifecycle: Pending → Ready → Running → terminal, with Failed
/// re-entering Ready under the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Skipped,
}

impl StepState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepState::Succeeded | StepState::Failed | StepState::Cancelled | StepState::Skipped
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepState::Pending => "pending",
            StepState::Ready => "ready",
            StepState::Running => "running",
            StepState::Succeeded => "succeeded",
            StepState::Failed => "failed",
            StepState::Cancelled => "cancelled",
            StepState::Skipped => "skipped",
        }
    }
}

/// Live status of one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepStatus {
    pub state: StepState,
    pub attempts: u32,
    /// Output payload of a succeeded step.
    pub output: Option<Value>,
    /// Failure classification for failed steps.
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    /// Why a skipped step was skipped (BudgetExceeded or DependencyFailed).
    pub skip_reason: Option<ErrorKind>,
}

impl StepStatus {
    pub fn pending() -> Self {
        Self {
            state: StepState::Pending,
            attempts: 0,
            output: None,
            error_kind: None,
            error_message: None,
            skip_reason: None,
        }
    }
}

/// Terminal disposition of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Succeeded,
    Failed,
    Cancelled,
}

/// The record a run leaves behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRunRecord {
    pub run_id: String,
    pub definition_id: String,
    pub inputs: Value,
    pub steps: BTreeMap<String, StepStatus>,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Present when the run terminated by cancellation.
    pub cancellation_reason: Option<String>,
}

impl WorkflowRunRecord {
    pub fn step(&self, id: &str) -> Option<&StepStatus> {
        self.steps.get(id)
    }
}
