//! Workflow definitions: the declarative step graph.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::DefinitionError;

/// Per-step retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Jitter fraction in [0, 1] applied to each interval.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    250
}

fn default_jitter() -> f64 {
    0.2
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            jitter: default_jitter(),
        }
    }
}

/// One node in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub id: String,
    /// Tool spec: `id`, `id@latest`, or `id@<version>`.
    pub tool: String,
    /// Input template; strings may reference `{{inputs...}}` and
    /// `{{steps.<id>.output...}}`.
    pub input: Value,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub bypass_cache: bool,
}

/// A declarative step graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    #[serde(default)]
    pub description: String,
    /// Run cost ceiling; the engine falls back to its configured default.
    #[serde(default)]
    pub budget_ceiling: Option<f64>,
    pub steps: Vec<StepDefinition>,
}

impl WorkflowDefinition {
    pub fn load_yaml(path: &Path) -> Result<Self, DefinitionError> {
        let raw = std::fs::read_to_string(path).map_err(|e| DefinitionError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let definition: WorkflowDefinition =
            serde_yaml::from_str(&raw).map_err(|e| DefinitionError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn step(&self, id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Duplicate ids, unknown dependencies, and cycles all fail loading.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(DefinitionError::DuplicateStep(step.id.clone()));
            }
        }
        for step in &self.steps {
            for dependency in &step.depends_on {
                if !seen.contains(dependency.as_str()) {
                    return Err(DefinitionError::UnknownDependency {
                        step: step.id.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        // Kahn's algorithm; leftover nodes mean a cycle.
        let mut in_degree: BTreeMap<&str, usize> = self
            .steps
            .iter()
            .map(|s| (s.id.as_str(), s.depends_on.len()))
            .collect();
        let mut queue: Vec<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut visited = 0;
        while let Some(current) = queue.pop() {
            visited += 1;
            for step in &self.steps {
                if step.depends_on.iter().any(|d| d == current) {
                    let degree = in_degree.get_mut(step.id.as_str()).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push(step.id.as_str());
                    }
                }
            }
        }
        if visited != self.steps.len() {
            let stuck = in_degree
                .iter()
                .find(|(_, d)| **d > 0)
                .map(|(id, _)| (*id).to_string())
                .unwrap_or_default();
            return Err(DefinitionError::Cycle(stuck));
        }
        Ok(())
    }

    /// Transitive ancestors of a step. A step may only observe outputs
    /// from this set.
    pub fn ancestors_of(&self, id: &str) -> HashSet<String> {
        let mut out = HashSet::new();
        let mut stack: Vec<&str> = self
            .step(id)
            .map(|s| s.depends_on.iter().map(String::as_str).collect())
            .unwrap_or_default();
        while let Some(current) = stack.pop() {
            if out.insert(current.to_string()) {
                if let Some(step) = self.step(current) {
                    stack.extend(step.depends_on.iter().map(String::as_str));
                }
            }
        }
        out
    }

    /// Direct dependents of a step.
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.depends_on.iter().any(|d| d == id))
            .map(|s| s.id.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(id: &str, deps: &[&str]) -> StepDefinition {
        StepDefinition {
            id: id.to_string(),
            tool: "echo".to_string(),
            input: json!({}),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            retry: RetryPolicy::default(),
            timeout_secs: None,
            bypass_cache: false,
        }
    }

    fn definition(steps: Vec<StepDefinition>) -> WorkflowDefinition {
        WorkflowDefinition {
            id: "wf".to_string(),
            description: String::new(),
            budget_ceiling: None,
            steps,
        }
    }

    #[test]
    fn valid_diamond_graph() {
        let def = definition(vec![
            step("a", &[]),
            step("b", &["a"]),
            step("c", &["a"]),
            step("d", &["b", "c"]),
        ]);
        def.validate().unwrap();
        let ancestors = def.ancestors_of("d");
        assert_eq!(ancestors.len(), 3);
        assert!(ancestors.contains("a"));
        assert_eq!(def.dependents_of("a"), vec!["b", "c"]);
    }

    #[test]
    fn cycle_is_rejected() {
        let def = definition(vec![step("a", &["b"]), step("b", &["a"])]);
        assert!(matches!(def.validate().unwrap_err(), DefinitionError::Cycle(_)));
    }

    #[test]
    fn duplicate_and_unknown_are_rejected() {
        let def = definition(vec![step("a", &[]), step("a", &[])]);
        assert!(matches!(
            def.validate().unwrap_err(),
            DefinitionError::DuplicateStep(_)
        ));

        let def = definition(vec![step("a", &["ghost"])]);
        assert!(matches!(
            def.validate().unwrap_err(),
            DefinitionError::UnknownDependency { .. }
        ));
    }

    #[test]
    fn yaml_round_trip() {
        let yaml = r#"
id: screen_and_examine
description: screen a batch then examine survivors
budget_ceiling: 0.25
steps:
  - id: screen
    tool: screen_funnel
    input:
      profile: "{{inputs.profile}}"
      opportunities: "{{inputs.opportunities}}"
      mode: both
  - id: examine
    tool: deep_intel
    depends_on: [screen]
    input:
      profile: "{{inputs.profile}}"
      opportunity: "{{steps.screen.output.recommended.0}}"
    retry:
      max_attempts: 2
"#;
        let def: WorkflowDefinition = serde_yaml::from_str(yaml).unwrap();
        def.validate().unwrap();
        assert_eq!(def.steps.len(), 2);
        assert_eq!(def.budget_ceiling, Some(0.25));
        assert_eq!(def.steps[1].retry.max_attempts, 2);
    }
}
