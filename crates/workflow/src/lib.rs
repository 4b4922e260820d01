//! Workflow engine
//!
//! Declarative step graphs: nodes are tool invocations, edges name the
//! outputs a step consumes. Execution runs on a bounded pool with per-step
//! retries, timeouts, cooperative cancellation, budget-driven skips, and a
//! checkpoint after every transition so a restart resumes from the first
//! non-terminal step.

mod checkpoint;
mod definition;
mod engine;
mod state;
mod template;

pub use checkpoint::{Checkpointer, FileCheckpointer, NullCheckpointer, RunCheckpoint};
pub use definition::{RetryPolicy, StepDefinition, WorkflowDefinition};
pub use engine::{EngineConfig, WorkflowEngine};
pub use state::{RunState, StepState, StepStatus, WorkflowRunRecord};
pub use template::resolve_template;

use grantscout_core::ToolError;

/// Definition-loading and validation failures.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("duplicate step id '{0}'")]
    DuplicateStep(String),

    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("dependency cycle through step '{0}'")]
    Cycle(String),
}

impl From<DefinitionError> for ToolError {
    fn from(err: DefinitionError) -> Self {
        ToolError::invalid_arguments(err.to_string())
    }
}
