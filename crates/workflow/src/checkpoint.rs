//! Run checkpointing.
//!
//! After every step transition the engine persists (step id, state, result
//! or error reference) so a restart resumes from the first non-terminal
//! step. Cached tools make replay exactly-once-observable; uncached tools
//! are at-least-once.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use grantscout_core::ToolError;

use crate::state::{RunState, StepStatus};

/// Everything needed to resume a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCheckpoint {
    pub run_id: String,
    pub definition_id: String,
    pub inputs: Value,
    pub steps: BTreeMap<String, StepStatus>,
    /// Set once the run reaches a terminal state.
    pub run_state: Option<RunState>,
}

/// Persistence for run checkpoints.
pub trait Checkpointer: Send + Sync {
    fn save(&self, checkpoint: &RunCheckpoint) -> Result<(), ToolError>;
    fn load(&self, run_id: &str) -> Result<Option<RunCheckpoint>, ToolError>;
}

/// Discards checkpoints; for tests and fire-and-forget runs.
pub struct NullCheckpointer;

impl Checkpointer for NullCheckpointer {
    fn save(&self, _checkpoint: &RunCheckpoint) -> Result<(), ToolError> {
        Ok(())
    }

    fn load(&self, _run_id: &str) -> Result<Option<RunCheckpoint>, ToolError> {
        Ok(None)
    }
}

/// One JSON file per run under a configured directory, written via a
/// temporary file and an atomic rename so a crash never leaves a torn
/// checkpoint behind.
pub struct FileCheckpointer {
    directory: PathBuf,
}

impl FileCheckpointer {
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, ToolError> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|e| {
            ToolError::transient(format!(
                "failed to create checkpoint directory {}: {e}",
                directory.display()
            ))
        })?;
        Ok(Self { directory })
    }

    fn path_for(&self, run_id: &str) -> PathBuf {
        // Run ids are UUIDs; sanitize anyway in case a caller supplies one.
        let safe: String = run_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.directory.join(format!("{safe}.json"))
    }
}

impl Checkpointer for FileCheckpointer {
    fn save(&self, checkpoint: &RunCheckpoint) -> Result<(), ToolError> {
        let target = self.path_for(&checkpoint.run_id);
        let temp = target.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(checkpoint)
            .map_err(|e| ToolError::transient(format!("failed to serialize checkpoint: {e}")))?;
        std::fs::write(&temp, body)
            .map_err(|e| ToolError::transient(format!("failed to write checkpoint: {e}")))?;
        std::fs::rename(&temp, &target)
            .map_err(|e| ToolError::transient(format!("failed to publish checkpoint: {e}")))?;
        Ok(())
    }

    fn load(&self, run_id: &str) -> Result<Option<RunCheckpoint>, ToolError> {
        let path = self.path_for(run_id);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ToolError::transient(format!(
                    "failed to read checkpoint {}: {e}",
                    path.display()
                )))
            }
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| ToolError::transient(format!("corrupt checkpoint {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StepState;
    use serde_json::json;

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let checkpointer = FileCheckpointer::new(dir.path()).unwrap();

        let mut steps = BTreeMap::new();
        let mut status = StepStatus::pending();
        status.state = StepState::Succeeded;
        status.output = Some(json!({"value": 1}));
        steps.insert("parse".to_string(), status);

        let checkpoint = RunCheckpoint {
            run_id: "run-42".to_string(),
            definition_id: "wf".to_string(),
            inputs: json!({"profile": "p1"}),
            steps,
            run_state: None,
        };
        checkpointer.save(&checkpoint).unwrap();

        let loaded = checkpointer.load("run-42").unwrap().unwrap();
        assert_eq!(loaded.definition_id, "wf");
        assert_eq!(loaded.steps["parse"].state, StepState::Succeeded);
        assert_eq!(loaded.steps["parse"].output, Some(json!({"value": 1})));

        assert!(checkpointer.load("run-missing").unwrap().is_none());
    }

    #[test]
    fn overwrites_are_atomic_replacements() {
        let dir = tempfile::tempdir().unwrap();
        let checkpointer = FileCheckpointer::new(dir.path()).unwrap();
        let mut checkpoint = RunCheckpoint {
            run_id: "run-1".to_string(),
            definition_id: "wf".to_string(),
            inputs: json!({}),
            steps: BTreeMap::new(),
            run_state: None,
        };
        checkpointer.save(&checkpoint).unwrap();
        checkpoint.run_state = Some(crate::state::RunState::Succeeded);
        checkpointer.save(&checkpoint).unwrap();

        let loaded = checkpointer.load("run-1").unwrap().unwrap();
        assert_eq!(loaded.run_state, Some(crate::state::RunState::Succeeded));
    }
}
