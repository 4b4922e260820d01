//! The registry: resolution by `id@version`, uniform invocation, caching,
//! and budget gating.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::Semaphore;

use grantscout_core::{
    events, ErrorKind, Fingerprint, Tool, ToolContext, ToolError, ToolMetadata, ToolResult,
};

use crate::metadata::DiscoveryError;
use crate::tracker::{ToolCallRecord, ToolCallTracker};

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Concurrent executions across the whole registry.
    pub max_concurrent: usize,
    /// Callers allowed to wait for a slot before QueueFull.
    pub admission_queue: usize,
    /// TTL applied when a tool's metadata declares none.
    pub default_result_ttl: Option<Duration>,
    /// Invocation history depth.
    pub history: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_concurrent: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            admission_queue: 256,
            default_result_ttl: Some(Duration::from_secs(24 * 60 * 60)),
            history: 1_024,
        }
    }
}

/// Per-invocation options.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvokeOptions {
    /// Skip the read-through cache and recompute.
    pub bypass_cache: bool,
}

struct RegisteredTool {
    tool: Arc<dyn Tool>,
    metadata: ToolMetadata,
    input_schema: jsonschema::JSONSchema,
    output_schema: jsonschema::JSONSchema,
}

/// Invocation by identifier, the only way tools reach each other.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// `spec` is `id`, `id@latest`, or `id@<version>`.
    async fn invoke(
        &self,
        spec: &str,
        input: Value,
        ctx: &ToolContext,
        options: InvokeOptions,
    ) -> Result<ToolResult, ToolError>;

    /// Planned per-call cost of a tool, for budget pre-checks.
    fn planned_cost(&self, spec: &str) -> Option<f64>;
}

pub struct ToolRegistry {
    /// id → implementations, versions ascending.
    tools: RwLock<HashMap<String, Vec<Arc<RegisteredTool>>>>,
    admission: Semaphore,
    waiting: AtomicUsize,
    config: RegistryConfig,
    pub tracker: ToolCallTracker,
}

impl ToolRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            admission: Semaphore::new(config.max_concurrent.max(1)),
            waiting: AtomicUsize::new(0),
            tracker: ToolCallTracker::new(config.history),
            config,
        }
    }

    pub fn shared(config: RegistryConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    /// Register an implementation. Fails on a duplicate (id, version) or a
    /// schema that does not compile.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let metadata = tool.metadata().clone();
        let input_schema = compile_schema(&metadata, "input", &metadata.input_schema)?;
        let output_schema = compile_schema(&metadata, "output", &metadata.output_schema)?;

        let mut tools = self.tools.write();
        let versions = tools.entry(metadata.id.clone()).or_default();
        if versions.iter().any(|t| t.metadata.version == metadata.version) {
            return Err(ToolError::invalid_arguments(format!(
                "duplicate tool registration: {}",
                metadata.qualified_id()
            )));
        }
        versions.push(Arc::new(RegisteredTool {
            tool,
            metadata,
            input_schema,
            output_schema,
        }));
        versions.sort_by(|a, b| compare_versions(&a.metadata.version, &b.metadata.version));
        Ok(())
    }

    /// Cross-check registered implementations against discovered metadata:
    /// every declared tool must have an implementation of the declared
    /// version, with matching capability and cost.
    pub fn verify_against(
        &self,
        declared: &HashMap<String, ToolMetadata>,
    ) -> Result<(), DiscoveryError> {
        let tools = self.tools.read();
        for (id, declared_metadata) in declared {
            let implemented = tools
                .get(id)
                .and_then(|versions| {
                    versions
                        .iter()
                        .find(|t| t.metadata.version == declared_metadata.version)
                })
                .ok_or_else(|| DiscoveryError::UnknownDependency {
                    tool: id.clone(),
                    dependency: format!("implementation {}", declared_metadata.qualified_id()),
                })?;
            if implemented.metadata.capability != declared_metadata.capability
                || (implemented.metadata.cost.per_call - declared_metadata.cost.per_call).abs()
                    > f64::EPSILON
            {
                return Err(DiscoveryError::Parse {
                    path: id.clone(),
                    message: "metadata file disagrees with implementation".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn has(&self, id: &str) -> bool {
        self.tools.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tools.read().values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list(&self) -> Vec<ToolMetadata> {
        self.tools
            .read()
            .values()
            .flat_map(|versions| versions.iter().map(|t| t.metadata.clone()))
            .collect()
    }

    fn resolve(&self, spec: &str) -> Result<Arc<RegisteredTool>, ToolError> {
        let (id, version) = match spec.split_once('@') {
            Some((id, version)) => (id, Some(version)),
            None => (spec, None),
        };
        let tools = self.tools.read();
        let versions = tools
            .get(id)
            .ok_or_else(|| ToolError::not_found(format!("tool not registered: {id}")))?;
        let registered = match version {
            None | Some("latest") => versions.last(),
            Some(version) => versions.iter().find(|t| t.metadata.version == version),
        };
        registered.cloned().ok_or_else(|| {
            ToolError::not_found(format!("tool {spec} not registered at that version"))
        })
    }

    async fn admit(&self, ctx: &ToolContext) -> Result<tokio::sync::SemaphorePermit<'_>, ToolError> {
        if self.waiting.load(Ordering::SeqCst) >= self.config.admission_queue {
            return Err(ToolError::queue_full(
                "tool admission queue is full; retry later",
            ));
        }
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let permit = tokio::select! {
            permit = self.admission.acquire() => permit
                .map_err(|_| ToolError::transient("admission semaphore closed")),
            _ = ctx.cancel.cancelled() => Err(ToolError::cancelled()),
        };
        self.waiting.fetch_sub(1, Ordering::SeqCst);
        permit
    }

    fn record(
        &self,
        metadata: &ToolMetadata,
        fingerprint: &Fingerprint,
        started: Instant,
        cost: f64,
        cached: bool,
        outcome: Result<(), ErrorKind>,
    ) {
        self.tracker.record(ToolCallRecord {
            tool_id: metadata.id.clone(),
            fingerprint: fingerprint.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
            cost,
            cached,
            success: outcome.is_ok(),
            error_kind: outcome.err(),
            at: Utc::now(),
        });
    }
}

#[async_trait]
impl ToolInvoker for ToolRegistry {
    async fn invoke(
        &self,
        spec: &str,
        input: Value,
        ctx: &ToolContext,
        options: InvokeOptions,
    ) -> Result<ToolResult, ToolError> {
        let registered = self.resolve(spec)?;
        let metadata = &registered.metadata;
        let started = Instant::now();

        let _permit = self.admit(ctx).await?;
        ctx.checkpoint()
            .map_err(|e| e.with_correlation(ctx.correlation_id))?;

        // Framework-side validation before the tool sees the input.
        validate(&registered.input_schema, &input, "input")?;
        registered.tool.validate(&input)?;

        let fingerprint = Fingerprint::compute(&metadata.id, &metadata.version, &input);

        if !options.bypass_cache {
            if let Some(cached) = ctx.store.get_result(&fingerprint) {
                events::tool_cached(&metadata.id, &metadata.version, ctx.correlation_id);
                self.record(metadata, &fingerprint, started, 0.0, true, Ok(()));
                return Ok(cached);
            }
        }

        events::tool_started(&metadata.id, &metadata.version, ctx.correlation_id);

        // Only billable tools consult the budget gate.
        let cost = if metadata.is_billable() {
            if let Err(err) = ctx.cost.reserve(metadata.cost.per_call) {
                events::budget_denied(&metadata.id, ctx.correlation_id, metadata.cost.per_call);
                self.record(
                    metadata,
                    &fingerprint,
                    started,
                    0.0,
                    false,
                    Err(ErrorKind::BudgetExceeded),
                );
                return Err(err.with_correlation(ctx.correlation_id));
            }
            metadata.cost.per_call
        } else {
            0.0
        };

        let execution = registered.tool.execute(input, ctx);
        let outcome = match ctx.time_remaining() {
            Some(remaining) => {
                tokio::select! {
                    outcome = tokio::time::timeout(remaining, execution) => outcome
                        .unwrap_or_else(|_| Err(ToolError::timeout(&metadata.id, remaining.as_secs_f64()))),
                    _ = ctx.cancel.cancelled() => Err(ToolError::cancelled()),
                }
            }
            None => {
                tokio::select! {
                    outcome = execution => outcome,
                    _ = ctx.cancel.cancelled() => Err(ToolError::cancelled()),
                }
            }
        };

        match outcome {
            Ok(payload) => {
                if let Err(err) = validate(&registered.output_schema, &payload, "output") {
                    if cost > 0.0 {
                        ctx.cost.refund(cost);
                    }
                    events::tool_failed(
                        &metadata.id,
                        ctx.correlation_id,
                        err.kind(),
                        &err.message,
                    );
                    self.record(metadata, &fingerprint, started, 0.0, false, Err(err.kind()));
                    return Err(err.with_correlation(ctx.correlation_id));
                }
                if cost > 0.0 {
                    ctx.cost.commit(cost);
                }

                let latency_ms = started.elapsed().as_millis() as u64;
                let result =
                    ToolResult::success(fingerprint.clone(), metadata, payload, cost, latency_ms);
                let ttl = metadata
                    .cache_ttl_secs
                    .map(Duration::from_secs)
                    .or(self.config.default_result_ttl);
                ctx.store.put_result(result.clone(), ttl);

                events::tool_succeeded(&metadata.id, ctx.correlation_id, cost, latency_ms);
                self.record(metadata, &fingerprint, started, cost, false, Ok(()));
                Ok(result)
            }
            Err(err) => {
                if cost > 0.0 {
                    ctx.cost.refund(cost);
                }
                events::tool_failed(&metadata.id, ctx.correlation_id, err.kind(), &err.message);
                self.record(metadata, &fingerprint, started, 0.0, false, Err(err.kind()));
                Err(err.with_correlation(ctx.correlation_id))
            }
        }
    }

    fn planned_cost(&self, spec: &str) -> Option<f64> {
        self.resolve(spec).ok().map(|t| t.metadata.cost.per_call)
    }
}

fn compile_schema(
    metadata: &ToolMetadata,
    which: &str,
    schema: &Value,
) -> Result<jsonschema::JSONSchema, ToolError> {
    jsonschema::JSONSchema::compile(schema).map_err(|e| {
        ToolError::invalid_arguments(format!(
            "tool {} has an invalid {which} schema: {e}",
            metadata.qualified_id()
        ))
    })
}

fn validate(
    schema: &jsonschema::JSONSchema,
    instance: &Value,
    which: &str,
) -> Result<(), ToolError> {
    let result = schema.validate(instance);
    if let Err(errors) = result {
        let detail: Vec<String> = errors.take(3).map(|e| e.to_string()).collect();
        return Err(ToolError::invalid_arguments(format!(
            "{which} schema violation: {}",
            detail.join("; ")
        )));
    }
    Ok(())
}

/// Dotted numeric version comparison; non-numeric segments compare
/// lexically after numeric ones.
fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|seg| seg.parse::<u64>().unwrap_or(0))
            .collect()
    };
    parse(a).cmp(&parse(b)).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantscout_budget::RunBudget;
    use grantscout_core::{Capability, CostModel};
    use grantscout_store::MemoryStore;
    use serde_json::json;

    struct EchoTool {
        metadata: ToolMetadata,
    }

    impl EchoTool {
        fn new(id: &str, version: &str, capability: Capability, per_call: f64) -> Self {
            Self {
                metadata: ToolMetadata {
                    id: id.to_string(),
                    version: version.to_string(),
                    description: "echoes its input".to_string(),
                    capability,
                    cost: CostModel { per_call },
                    input_schema: json!({
                        "type": "object",
                        "required": ["value"],
                        "properties": {"value": {"type": "number"}}
                    }),
                    output_schema: json!({
                        "type": "object",
                        "required": ["value"],
                        "properties": {"value": {"type": "number"}}
                    }),
                    dependencies: vec![],
                    cache_ttl_secs: None,
                },
            }
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn metadata(&self) -> &ToolMetadata {
            &self.metadata
        }

        async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
            Ok(json!({"value": input["value"].as_f64().unwrap_or(0.0)}))
        }
    }

    fn context() -> ToolContext {
        ToolContext::new(
            Arc::new(RunBudget::unlimited()),
            MemoryStore::shared(Default::default()),
        )
    }

    fn registry_with_echo() -> ToolRegistry {
        let registry = ToolRegistry::new(RegistryConfig::default());
        registry
            .register(Arc::new(EchoTool::new("echo", "1.0.0", Capability::Pure, 0.0)))
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn invoke_validates_and_executes() {
        let registry = registry_with_echo();
        let ctx = context();

        let result = registry
            .invoke("echo", json!({"value": 7.0}), &ctx, InvokeOptions::default())
            .await
            .unwrap();
        assert_eq!(result.payload, json!({"value": 7.0}));
        assert!(result.success);

        let err = registry
            .invoke("echo", json!({"wrong": true}), &ctx, InvokeOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
    }

    #[tokio::test]
    async fn second_call_hits_cache_without_cost() {
        let registry = ToolRegistry::new(RegistryConfig::default());
        registry
            .register(Arc::new(EchoTool::new(
                "paid_echo",
                "1.0.0",
                Capability::Billable,
                0.01,
            )))
            .unwrap();

        let budget = Arc::new(RunBudget::unlimited());
        let ctx = ToolContext::new(budget.clone(), MemoryStore::shared(Default::default()));

        let first = registry
            .invoke("paid_echo", json!({"value": 1.0}), &ctx, InvokeOptions::default())
            .await
            .unwrap();
        assert!((budget.committed() - 0.01).abs() < 1e-9);

        let second = registry
            .invoke("paid_echo", json!({"value": 1.0}), &ctx, InvokeOptions::default())
            .await
            .unwrap();
        // Identical fingerprints, identical payloads, no extra cost.
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(first.payload, second.payload);
        assert!((budget.committed() - 0.01).abs() < 1e-9);

        let recent = registry.tracker.recent(1);
        assert!(recent[0].cached);
    }

    #[tokio::test]
    async fn bypass_cache_recomputes_and_recommits() {
        let registry = ToolRegistry::new(RegistryConfig::default());
        registry
            .register(Arc::new(EchoTool::new(
                "paid_echo",
                "1.0.0",
                Capability::Billable,
                0.01,
            )))
            .unwrap();
        let budget = Arc::new(RunBudget::unlimited());
        let ctx = ToolContext::new(budget.clone(), MemoryStore::shared(Default::default()));

        for _ in 0..2 {
            registry
                .invoke(
                    "paid_echo",
                    json!({"value": 1.0}),
                    &ctx,
                    InvokeOptions { bypass_cache: true },
                )
                .await
                .unwrap();
        }
        assert!((budget.committed() - 0.02).abs() < 1e-9);
    }

    #[tokio::test]
    async fn budget_denial_short_circuits() {
        let registry = ToolRegistry::new(RegistryConfig::default());
        registry
            .register(Arc::new(EchoTool::new(
                "expensive",
                "1.0.0",
                Capability::Billable,
                5.0,
            )))
            .unwrap();
        let ledger = Arc::new(grantscout_budget::CostLedger::new(Default::default()));
        let budget = Arc::new(RunBudget::new(ledger, Some(1.0)));
        let ctx = ToolContext::new(budget.clone(), MemoryStore::shared(Default::default()));

        let err = registry
            .invoke("expensive", json!({"value": 1.0}), &ctx, InvokeOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BudgetExceeded);
        assert!((budget.committed()).abs() < 1e-12);
    }

    #[tokio::test]
    async fn version_resolution_prefers_latest() {
        let registry = ToolRegistry::new(RegistryConfig::default());
        registry
            .register(Arc::new(EchoTool::new("echo", "1.0.0", Capability::Pure, 0.0)))
            .unwrap();
        registry
            .register(Arc::new(EchoTool::new("echo", "1.2.0", Capability::Pure, 0.0)))
            .unwrap();
        registry
            .register(Arc::new(EchoTool::new("echo", "1.10.0", Capability::Pure, 0.0)))
            .unwrap();

        let ctx = context();
        let result = registry
            .invoke("echo@latest", json!({"value": 2.0}), &ctx, InvokeOptions::default())
            .await
            .unwrap();
        assert_eq!(result.tool_version, "1.10.0");

        let pinned = registry
            .invoke("echo@1.0.0", json!({"value": 2.0}), &ctx, InvokeOptions::default())
            .await
            .unwrap();
        assert_eq!(pinned.tool_version, "1.0.0");

        assert!(registry
            .invoke("echo@9.9.9", json!({"value": 2.0}), &ctx, InvokeOptions::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let registry = registry_with_echo();
        let err = registry
            .register(Arc::new(EchoTool::new("echo", "1.0.0", Capability::Pure, 0.0)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
    }

    #[tokio::test]
    async fn cancelled_context_refuses_to_run() {
        let registry = registry_with_echo();
        let ctx = context();
        ctx.cancel.cancel();
        let err = registry
            .invoke("echo", json!({"value": 1.0}), &ctx, InvokeOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }
}
