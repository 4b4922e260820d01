//! The scheduler: bounded pool, readiness, retries, budget skips,
//! cancellation, and checkpoints.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use grantscout_core::{events, ErrorKind, ToolContext, ToolError};
use grantscout_tools::{InvokeOptions, ToolInvoker};

use crate::checkpoint::{Checkpointer, RunCheckpoint};
use crate::definition::{StepDefinition, WorkflowDefinition};
use crate::state::{RunState, StepState, StepStatus, WorkflowRunRecord};
use crate::template::resolve_template;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Concurrent steps per run.
    pub pool_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_size: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

pub struct WorkflowEngine {
    invoker: Arc<dyn ToolInvoker>,
    checkpointer: Arc<dyn Checkpointer>,
    config: EngineConfig,
}

/// What one step task reports back to the scheduler.
struct StepCompletion {
    step_id: String,
    attempts: u32,
    outcome: Result<Value, ToolError>,
}

impl WorkflowEngine {
    pub fn new(
        invoker: Arc<dyn ToolInvoker>,
        checkpointer: Arc<dyn Checkpointer>,
        config: EngineConfig,
    ) -> Self {
        Self {
            invoker,
            checkpointer,
            config,
        }
    }

    /// Execute a run from scratch. The context supplies the budget gate
    /// (sized from the definition's ceiling by the caller), the store, and
    /// the cancellation signal.
    pub async fn run(
        &self,
        definition: &WorkflowDefinition,
        inputs: Value,
        ctx: ToolContext,
    ) -> Result<WorkflowRunRecord, ToolError> {
        definition.validate().map_err(ToolError::from)?;
        let statuses: BTreeMap<String, StepStatus> = definition
            .steps
            .iter()
            .map(|s| (s.id.clone(), StepStatus::pending()))
            .collect();
        self.execute(definition, inputs, ctx, statuses).await
    }

    /// Resume a run from its checkpoint: succeeded steps keep their
    /// outputs, everything else starts over. With read-through-cached
    /// tools the replay is exactly-once-observable.
    pub async fn resume(
        &self,
        definition: &WorkflowDefinition,
        ctx: ToolContext,
    ) -> Result<WorkflowRunRecord, ToolError> {
        definition.validate().map_err(ToolError::from)?;
        let run_id = ctx
            .run_id
            .clone()
            .ok_or_else(|| ToolError::invalid_arguments("resume requires a run id"))?;
        let checkpoint = self
            .checkpointer
            .load(&run_id)?
            .ok_or_else(|| ToolError::not_found(format!("no checkpoint for run {run_id}")))?;

        let mut statuses: BTreeMap<String, StepStatus> = definition
            .steps
            .iter()
            .map(|s| (s.id.clone(), StepStatus::pending()))
            .collect();
        for (step_id, recorded) in checkpoint.steps {
            if recorded.state == StepState::Succeeded {
                statuses.insert(step_id, recorded);
            }
        }
        self.execute(definition, checkpoint.inputs, ctx, statuses).await
    }

    async fn execute(
        &self,
        definition: &WorkflowDefinition,
        inputs: Value,
        ctx: ToolContext,
        mut statuses: BTreeMap<String, StepStatus>,
    ) -> Result<WorkflowRunRecord, ToolError> {
        let started_at = Utc::now();
        let run_id = ctx
            .run_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let ctx = ctx.with_run_id(run_id.clone());

        let mut outputs: HashMap<String, Value> = statuses
            .iter()
            .filter(|(_, s)| s.state == StepState::Succeeded)
            .filter_map(|(id, s)| s.output.clone().map(|o| (id.clone(), o)))
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.config.pool_size.max(1)));
        let mut join: JoinSet<StepCompletion> = JoinSet::new();

        self.checkpoint(&run_id, definition, &inputs, &statuses, None);

        loop {
            if !ctx.cancel.is_cancelled() {
                self.schedule_ready(
                    definition,
                    &inputs,
                    &ctx,
                    &run_id,
                    &mut statuses,
                    &outputs,
                    &semaphore,
                    &mut join,
                );
            }

            if join.is_empty() {
                break;
            }

            let Some(joined) = join.join_next().await else {
                break;
            };
            let completion = match joined {
                Ok(completion) => completion,
                Err(join_error) => {
                    tracing::error!(error = %join_error, "workflow step task panicked");
                    continue;
                }
            };
            self.settle(
                definition,
                &inputs,
                &run_id,
                &mut statuses,
                &mut outputs,
                completion,
            );
        }

        // Runnable steps that never started under cancellation.
        if ctx.cancel.is_cancelled() {
            for step in &definition.steps {
                let status = statuses.get_mut(&step.id).expect("all steps seeded");
                if !status.state.is_terminal() {
                    self.transition(&run_id, &step.id, status, StepState::Cancelled);
                }
            }
        }

        let state = if ctx.cancel.is_cancelled() {
            RunState::Cancelled
        } else if statuses
            .values()
            .any(|s| matches!(s.state, StepState::Failed | StepState::Cancelled))
        {
            RunState::Failed
        } else {
            RunState::Succeeded
        };

        self.checkpoint(&run_id, definition, &inputs, &statuses, Some(state));

        Ok(WorkflowRunRecord {
            run_id,
            definition_id: definition.id.clone(),
            inputs,
            steps: statuses,
            state,
            started_at,
            finished_at: Utc::now(),
            cancellation_reason: (state == RunState::Cancelled)
                .then(|| "run cancellation signal tripped".to_string()),
        })
    }

    /// Promote Pending steps whose ancestors all succeeded, then launch
    /// every Ready step the budget allows.
    #[allow(clippy::too_many_arguments)]
    fn schedule_ready(
        &self,
        definition: &WorkflowDefinition,
        inputs: &Value,
        ctx: &ToolContext,
        run_id: &str,
        statuses: &mut BTreeMap<String, StepStatus>,
        outputs: &HashMap<String, Value>,
        semaphore: &Arc<Semaphore>,
        join: &mut JoinSet<StepCompletion>,
    ) {
        for step in &definition.steps {
            let ready = {
                let status = &statuses[&step.id];
                status.state == StepState::Pending
                    && step
                        .depends_on
                        .iter()
                        .all(|d| statuses.get(d).map(|s| s.state) == Some(StepState::Succeeded))
            };
            if ready {
                let status = statuses.get_mut(&step.id).expect("all steps seeded");
                self.transition(run_id, &step.id, status, StepState::Ready);
            }

            if statuses[&step.id].state != StepState::Ready {
                continue;
            }

            // Budget pre-check on the planned cost.
            let planned = self.invoker.planned_cost(&step.tool).unwrap_or(0.0);
            if planned > 0.0 {
                if let Some(remaining) = ctx.cost.remaining() {
                    if remaining < planned {
                        self.skip(definition, run_id, statuses, &step.id, ErrorKind::BudgetExceeded);
                        continue;
                    }
                }
            }

            // A step observes only its declared ancestors' outputs.
            let ancestors = definition.ancestors_of(&step.id);
            let visible: HashMap<String, Value> = outputs
                .iter()
                .filter(|(id, _)| ancestors.contains(*id))
                .map(|(id, v)| (id.clone(), v.clone()))
                .collect();
            let resolved = match resolve_template(&step.input, inputs, &visible) {
                Ok(resolved) => resolved,
                Err(err) => {
                    let status = statuses.get_mut(&step.id).expect("all steps seeded");
                    status.error_kind = Some(err.kind());
                    status.error_message = Some(err.message.clone());
                    self.transition(run_id, &step.id, status, StepState::Failed);
                    self.checkpoint(run_id, definition, inputs, statuses, None);
                    self.cascade_skip(definition, run_id, statuses, &step.id);
                    continue;
                }
            };

            let status = statuses.get_mut(&step.id).expect("all steps seeded");
            self.transition(run_id, &step.id, status, StepState::Running);
            self.checkpoint(run_id, definition, inputs, statuses, None);

            join.spawn(run_step(
                self.invoker.clone(),
                step.clone(),
                resolved,
                ctx.clone(),
                semaphore.clone(),
                run_id.to_string(),
            ));
        }
    }

    /// Fold a completed step back into the run state.
    fn settle(
        &self,
        definition: &WorkflowDefinition,
        inputs: &Value,
        run_id: &str,
        statuses: &mut BTreeMap<String, StepStatus>,
        outputs: &mut HashMap<String, Value>,
        completion: StepCompletion,
    ) {
        let StepCompletion {
            step_id,
            attempts,
            outcome,
        } = completion;
        let status = statuses.get_mut(&step_id).expect("all steps seeded");
        status.attempts = attempts;

        match outcome {
            Ok(payload) => {
                status.output = Some(payload.clone());
                self.transition(run_id, &step_id, status, StepState::Succeeded);
                outputs.insert(step_id, payload);
            }
            Err(err) if err.kind() == ErrorKind::Cancelled => {
                status.error_kind = Some(ErrorKind::Cancelled);
                self.transition(run_id, &step_id, status, StepState::Cancelled);
            }
            Err(err) if err.kind() == ErrorKind::BudgetExceeded => {
                // A reservation denied mid-flight is a budget skip, not a
                // failure; dependents are skipped with it.
                self.skip(definition, run_id, statuses, &step_id, ErrorKind::BudgetExceeded);
            }
            Err(err) => {
                let status = statuses.get_mut(&step_id).expect("all steps seeded");
                status.error_kind = Some(err.kind());
                status.error_message = Some(err.message.clone());
                self.transition(run_id, &step_id, status, StepState::Failed);
                self.cascade_skip(definition, run_id, statuses, &step_id);
            }
        }
        self.checkpoint(run_id, definition, inputs, statuses, None);
    }

    /// Skip one step and everything downstream of it.
    fn skip(
        &self,
        definition: &WorkflowDefinition,
        run_id: &str,
        statuses: &mut BTreeMap<String, StepStatus>,
        step_id: &str,
        reason: ErrorKind,
    ) {
        if let Some(status) = statuses.get_mut(step_id) {
            if !status.state.is_terminal() {
                status.skip_reason = Some(reason);
                self.transition(run_id, step_id, status, StepState::Skipped);
            }
        }
        self.cascade_skip(definition, run_id, statuses, step_id);
    }

    /// Transitive dependents of a terminally failed or skipped step are
    /// skipped with DependencyFailed.
    fn cascade_skip(
        &self,
        definition: &WorkflowDefinition,
        run_id: &str,
        statuses: &mut BTreeMap<String, StepStatus>,
        root: &str,
    ) {
        let mut stack: Vec<String> = definition
            .dependents_of(root)
            .into_iter()
            .map(String::from)
            .collect();
        while let Some(dependent) = stack.pop() {
            if let Some(status) = statuses.get_mut(&dependent) {
                if !status.state.is_terminal() {
                    status.skip_reason = Some(ErrorKind::DependencyFailed);
                    self.transition(run_id, &dependent, status, StepState::Skipped);
                    stack.extend(definition.dependents_of(&dependent).into_iter().map(String::from));
                }
            }
        }
    }

    fn transition(&self, run_id: &str, step_id: &str, status: &mut StepStatus, to: StepState) {
        let from = status.state;
        status.state = to;
        events::workflow_step_transition(run_id, step_id, from.as_str(), to.as_str());
    }

    fn checkpoint(
        &self,
        run_id: &str,
        definition: &WorkflowDefinition,
        inputs: &Value,
        statuses: &BTreeMap<String, StepStatus>,
        run_state: Option<RunState>,
    ) {
        let checkpoint = RunCheckpoint {
            run_id: run_id.to_string(),
            definition_id: definition.id.clone(),
            inputs: inputs.clone(),
            steps: statuses.clone(),
            run_state,
        };
        if let Err(err) = self.checkpointer.save(&checkpoint) {
            // A lost checkpoint degrades resumability, not the run itself.
            tracing::warn!(run = %run_id, error = %err, "failed to persist checkpoint");
        }
    }
}

/// One step's lifetime on the pool: admission, attempts, back-off.
async fn run_step(
    invoker: Arc<dyn ToolInvoker>,
    step: StepDefinition,
    input: Value,
    ctx: ToolContext,
    semaphore: Arc<Semaphore>,
    run_id: String,
) -> StepCompletion {
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return StepCompletion {
            step_id: step.id,
            attempts: 0,
            outcome: Err(ToolError::transient("run pool closed")),
        };
    };

    let options = InvokeOptions {
        bypass_cache: step.bypass_cache,
    };
    let max_attempts = step.retry.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        if ctx.cancel.is_cancelled() {
            return StepCompletion {
                step_id: step.id,
                attempts: attempt,
                outcome: Err(ToolError::cancelled()),
            };
        }

        // Per-attempt deadline; the invoker trips the tool at expiry.
        let attempt_ctx = match step.timeout_secs {
            Some(secs) => ctx.child_with_timeout(Duration::from_secs(secs)),
            None => ctx.clone(),
        };

        match invoker.invoke(&step.tool, input.clone(), &attempt_ctx, options).await {
            Ok(result) => {
                return StepCompletion {
                    step_id: step.id,
                    attempts: attempt,
                    outcome: Ok(result.payload),
                }
            }
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                events::workflow_step_transition(&run_id, &step.id, "running", "failed");
                events::workflow_step_transition(&run_id, &step.id, "failed", "ready");
                let backoff = backoff_for(&step, attempt);
                tracing::debug!(
                    run = %run_id,
                    step = %step.id,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    kind = err.kind().as_str(),
                    "retrying step"
                );
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = ctx.cancel.cancelled() => {
                        return StepCompletion {
                            step_id: step.id,
                            attempts: attempt,
                            outcome: Err(ToolError::cancelled()),
                        }
                    }
                }
                events::workflow_step_transition(&run_id, &step.id, "ready", "running");
            }
            Err(err) => {
                let outcome = Err(err.with_step(step.id.clone()));
                return StepCompletion {
                    step_id: step.id,
                    attempts: attempt,
                    outcome,
                }
            }
        }
    }
}

/// Exponential back-off with jitter from the step's retry policy.
fn backoff_for(step: &StepDefinition, attempt: u32) -> Duration {
    let base = step.retry.backoff_base_ms as f64;
    let exp = base * 2f64.powi(attempt.saturating_sub(1) as i32);
    let jitter = if step.retry.jitter > 0.0 {
        rand::thread_rng().gen_range(0.0..step.retry.jitter)
    } else {
        0.0
    };
    Duration::from_millis((exp * (1.0 + jitter)) as u64)
}
