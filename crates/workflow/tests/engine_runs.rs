//! Workflow engine behavior over a small test tool set.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use grantscout_budget::{BudgetCaps, CostLedger, RunBudget};
use grantscout_core::{
    Capability, CostModel, ErrorKind, Tool, ToolContext, ToolError, ToolMetadata,
};
use grantscout_store::MemoryStore;
use grantscout_tools::{RegistryConfig, ToolRegistry};
use grantscout_workflow::{
    Checkpointer, EngineConfig, FileCheckpointer, NullCheckpointer, RetryPolicy, RunState,
    StepDefinition, StepState, WorkflowDefinition, WorkflowEngine,
};

fn metadata(id: &str, capability: Capability, per_call: f64) -> ToolMetadata {
    ToolMetadata {
        id: id.to_string(),
        version: "1.0.0".to_string(),
        description: format!("{id} test tool"),
        capability,
        cost: CostModel { per_call },
        input_schema: json!({"type": "object"}),
        output_schema: json!({"type": "object"}),
        dependencies: vec![],
        cache_ttl_secs: None,
    }
}

/// Doubles `value`, counting executions.
struct DoubleTool {
    metadata: ToolMetadata,
    executions: Arc<AtomicU32>,
}

#[async_trait]
impl Tool for DoubleTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let value = input.get("value").and_then(|v| v.as_f64()).unwrap_or(0.0);
        Ok(json!({"value": value * 2.0}))
    }
}

/// Sleeps until cancelled or done.
struct SlowTool {
    metadata: ToolMetadata,
    delay: Duration,
}

#[async_trait]
impl Tool for SlowTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, _input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => Ok(json!({"slept": true})),
            _ = ctx.cancel.cancelled() => Err(ToolError::cancelled()),
        }
    }
}

/// Fails transiently until the configured attempt.
struct FlakyTool {
    metadata: ToolMetadata,
    calls: Arc<AtomicU32>,
    succeed_on: u32,
}

#[async_trait]
impl Tool for FlakyTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, _input: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.succeed_on {
            Ok(json!({"succeeded_on": call}))
        } else {
            Err(ToolError::transient("synthetic transient fault"))
        }
    }
}

/// Always rejects its arguments.
struct RejectingTool {
    metadata: ToolMetadata,
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl Tool for RejectingTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, _input: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ToolError::invalid_arguments("always rejected"))
    }
}

struct Fixture {
    registry: Arc<ToolRegistry>,
    double_executions: Arc<AtomicU32>,
    flaky_calls: Arc<AtomicU32>,
    reject_calls: Arc<AtomicU32>,
}

fn fixture() -> Fixture {
    let registry = ToolRegistry::shared(RegistryConfig::default());
    let double_executions = Arc::new(AtomicU32::new(0));
    let flaky_calls = Arc::new(AtomicU32::new(0));
    let reject_calls = Arc::new(AtomicU32::new(0));

    registry
        .register(Arc::new(DoubleTool {
            metadata: metadata("double", Capability::Pure, 0.0),
            executions: double_executions.clone(),
        }))
        .unwrap();
    registry
        .register(Arc::new(SlowTool {
            metadata: metadata("slow", Capability::Pure, 0.0),
            delay: Duration::from_secs(30),
        }))
        .unwrap();
    registry
        .register(Arc::new(SlowTool {
            metadata: metadata("quick", Capability::Pure, 0.0),
            delay: Duration::from_millis(10),
        }))
        .unwrap();
    registry
        .register(Arc::new(FlakyTool {
            metadata: metadata("flaky", Capability::Pure, 0.0),
            calls: flaky_calls.clone(),
            succeed_on: 2,
        }))
        .unwrap();
    registry
        .register(Arc::new(RejectingTool {
            metadata: metadata("reject", Capability::Pure, 0.0),
            calls: reject_calls.clone(),
        }))
        .unwrap();
    registry
        .register(Arc::new(DoubleTool {
            metadata: metadata("costly", Capability::Billable, 0.6),
            executions: Arc::new(AtomicU32::new(0)),
        }))
        .unwrap();

    Fixture {
        registry,
        double_executions,
        flaky_calls,
        reject_calls,
    }
}

fn step(id: &str, tool: &str, input: Value, deps: &[&str]) -> StepDefinition {
    StepDefinition {
        id: id.to_string(),
        tool: tool.to_string(),
        input,
        depends_on: deps.iter().map(|d| d.to_string()).collect(),
        retry: RetryPolicy {
            max_attempts: 3,
            backoff_base_ms: 5,
            jitter: 0.0,
        },
        timeout_secs: None,
        bypass_cache: false,
    }
}

fn definition(id: &str, steps: Vec<StepDefinition>) -> WorkflowDefinition {
    WorkflowDefinition {
        id: id.to_string(),
        description: String::new(),
        budget_ceiling: None,
        steps,
    }
}

fn context(ceiling: Option<f64>) -> ToolContext {
    let ledger = Arc::new(CostLedger::new(BudgetCaps::default()));
    ToolContext::new(
        Arc::new(RunBudget::new(ledger, ceiling)),
        MemoryStore::shared(Default::default()),
    )
}

fn engine(registry: &Arc<ToolRegistry>, checkpointer: Arc<dyn Checkpointer>) -> WorkflowEngine {
    WorkflowEngine::new(registry.clone(), checkpointer, EngineConfig::default())
}

#[tokio::test]
async fn outputs_thread_between_steps() {
    let f = fixture();
    let engine = engine(&f.registry, Arc::new(NullCheckpointer));
    let definition = definition(
        "chain",
        vec![
            step("first", "double", json!({"value": "{{inputs.seed}}"}), &[]),
            step(
                "second",
                "double",
                json!({"value": "{{steps.first.output.value}}"}),
                &["first"],
            ),
        ],
    );

    let record = engine
        .run(&definition, json!({"seed": 3.0}), context(None))
        .await
        .unwrap();

    assert_eq!(record.state, RunState::Succeeded);
    assert_eq!(record.step("second").unwrap().output, Some(json!({"value": 12.0})));
}

#[tokio::test]
async fn cancellation_keeps_finished_work_and_stops_the_rest() {
    let f = fixture();
    let engine = Arc::new(engine(&f.registry, Arc::new(NullCheckpointer)));
    let definition = Arc::new(definition(
        "parallel",
        vec![
            step("a", "quick", json!({}), &[]),
            step("b", "slow", json!({}), &[]),
            step("c", "slow", json!({}), &[]),
        ],
    ));

    let ctx = context(None);
    let cancel = ctx.cancel.clone();
    let run = {
        let engine = engine.clone();
        let definition = definition.clone();
        tokio::spawn(async move { engine.run(&definition, json!({}), ctx).await })
    };

    // Let the quick step finish, then cancel while b and c are in flight.
    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();
    let record = run.await.unwrap().unwrap();

    assert_eq!(record.state, RunState::Cancelled);
    assert!(record.cancellation_reason.is_some());
    assert_eq!(record.step("a").unwrap().state, StepState::Succeeded);
    assert_eq!(record.step("a").unwrap().output, Some(json!({"slept": true})));
    assert_eq!(record.step("b").unwrap().state, StepState::Cancelled);
    assert_eq!(record.step("c").unwrap().state, StepState::Cancelled);
}

#[tokio::test]
async fn transient_failures_retry_and_recover() {
    let f = fixture();
    let engine = engine(&f.registry, Arc::new(NullCheckpointer));
    let definition = definition("retry", vec![step("only", "flaky", json!({}), &[])]);

    let record = engine.run(&definition, json!({}), context(None)).await.unwrap();

    assert_eq!(record.state, RunState::Succeeded);
    let status = record.step("only").unwrap();
    assert_eq!(status.state, StepState::Succeeded);
    assert_eq!(status.attempts, 2);
    assert_eq!(f.flaky_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn invalid_arguments_never_retry_and_skip_dependents() {
    let f = fixture();
    let engine = engine(&f.registry, Arc::new(NullCheckpointer));
    let definition = definition(
        "permanent",
        vec![
            step("bad", "reject", json!({}), &[]),
            step("after", "double", json!({"value": 1.0}), &["bad"]),
        ],
    );

    let record = engine.run(&definition, json!({}), context(None)).await.unwrap();

    assert_eq!(record.state, RunState::Failed);
    let bad = record.step("bad").unwrap();
    assert_eq!(bad.state, StepState::Failed);
    assert_eq!(bad.error_kind, Some(ErrorKind::InvalidArguments));
    assert_eq!(bad.attempts, 1);
    assert_eq!(f.reject_calls.load(Ordering::SeqCst), 1);

    let after = record.step("after").unwrap();
    assert_eq!(after.state, StepState::Skipped);
    assert_eq!(after.skip_reason, Some(ErrorKind::DependencyFailed));
}

#[tokio::test]
async fn missing_input_reference_fails_the_step() {
    let f = fixture();
    let engine = engine(&f.registry, Arc::new(NullCheckpointer));
    let definition = definition(
        "missing",
        vec![step("only", "double", json!({"value": "{{inputs.absent}}"}), &[])],
    );

    let record = engine.run(&definition, json!({}), context(None)).await.unwrap();
    let status = record.step("only").unwrap();
    assert_eq!(status.state, StepState::Failed);
    assert_eq!(status.error_kind, Some(ErrorKind::MissingInput));
}

#[tokio::test]
async fn budget_exhaustion_skips_step_and_dependents() {
    let f = fixture();
    let engine = engine(&f.registry, Arc::new(NullCheckpointer));
    let definition = definition(
        "budgeted",
        vec![
            step("pay1", "costly", json!({"value": 1.0}), &[]),
            step("pay2", "costly", json!({"value": 2.0}), &["pay1"]),
            step("after", "double", json!({"value": 3.0}), &["pay2"]),
        ],
    );

    // Ceiling fits one 0.6 call, not two.
    let record = engine
        .run(&definition, json!({}), context(Some(1.0)))
        .await
        .unwrap();

    assert_eq!(record.step("pay1").unwrap().state, StepState::Succeeded);
    let pay2 = record.step("pay2").unwrap();
    assert_eq!(pay2.state, StepState::Skipped);
    assert_eq!(pay2.skip_reason, Some(ErrorKind::BudgetExceeded));
    let after = record.step("after").unwrap();
    assert_eq!(after.state, StepState::Skipped);
    assert_eq!(after.skip_reason, Some(ErrorKind::DependencyFailed));
    // Skips are not failures.
    assert_eq!(record.state, RunState::Succeeded);
}

#[tokio::test]
async fn step_timeout_is_enforced() {
    let f = fixture();
    let engine = engine(&f.registry, Arc::new(NullCheckpointer));
    let mut timed = step("only", "slow", json!({}), &[]);
    timed.timeout_secs = Some(1);
    timed.retry.max_attempts = 1;
    let definition = definition("timeout", vec![timed]);

    let record = engine.run(&definition, json!({}), context(None)).await.unwrap();
    let status = record.step("only").unwrap();
    assert_eq!(status.state, StepState::Failed);
    assert_eq!(status.error_kind, Some(ErrorKind::Timeout));
}

#[tokio::test]
async fn resume_skips_completed_steps() {
    let f = fixture();
    let dir = tempfile::tempdir().unwrap();
    let checkpointer = Arc::new(FileCheckpointer::new(dir.path()).unwrap());
    let engine = engine(&f.registry, checkpointer.clone());
    let definition = definition(
        "resumable",
        vec![
            step("first", "double", json!({"value": 5.0}), &[]),
            step(
                "second",
                "double",
                json!({"value": "{{steps.first.output.value}}"}),
                &["first"],
            ),
        ],
    );

    let ctx = context(None).with_run_id("run-resume");
    let record = engine.run(&definition, json!({}), ctx).await.unwrap();
    assert_eq!(record.state, RunState::Succeeded);
    let executions_after_first_run = f.double_executions.load(Ordering::SeqCst);
    assert_eq!(executions_after_first_run, 2);

    // Resuming the finished run re-settles from the checkpoint without
    // executing anything new, and reaches the same final state.
    let store = MemoryStore::shared(Default::default());
    let ledger = Arc::new(CostLedger::new(BudgetCaps::default()));
    let resume_ctx = ToolContext::new(Arc::new(RunBudget::new(ledger, None)), store)
        .with_run_id("run-resume");
    let resumed = engine.resume(&definition, resume_ctx).await.unwrap();

    assert_eq!(resumed.state, RunState::Succeeded);
    assert_eq!(
        resumed.step("second").unwrap().output,
        record.step("second").unwrap().output
    );
    assert_eq!(f.double_executions.load(Ordering::SeqCst), executions_after_first_run);
}
