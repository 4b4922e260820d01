//! The tool contract: metadata, capability classes, and the execution trait.
//!
//! Tools are stateless; everything an execution needs arrives through the
//! input payload and the [`ToolContext`](crate::context::ToolContext).
//! Implementations never hold references to other tools; composition goes
//! through the registry by string identifier.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ToolContext;
use crate::error::{ErrorKind, ToolError};
use crate::fingerprint::Fingerprint;

/// What a tool is allowed to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// No I/O of any kind.
    Pure,
    /// Filesystem, HTTP, or store access.
    ReadsExternal,
    /// External access plus metered inference; consults the budget gate.
    Billable,
}

/// Declared cost model. Only billable tools with a non-zero cost are gated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Cost in account units per invocation.
    pub per_call: f64,
}

/// Static description of a tool, mirrored by its metadata file on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub id: String,
    /// Semantic version; resolution accepts `id@version` or `id@latest`.
    pub version: String,
    pub description: String,
    pub capability: Capability,
    pub cost: CostModel,
    /// JSON Schema the input payload must satisfy.
    pub input_schema: Value,
    /// JSON Schema the output payload must satisfy.
    pub output_schema: Value,
    /// Identifiers of tools this tool invokes through the registry.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Freshness window for cached results; `None` means cache forever.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
}

impl ToolMetadata {
    /// Whether invocations must reserve budget before executing.
    pub fn is_billable(&self) -> bool {
        self.capability == Capability::Billable && self.cost.per_call > 0.0
    }

    pub fn qualified_id(&self) -> String {
        format!("{}@{}", self.id, self.version)
    }
}

/// Persisted outcome of one tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub fingerprint: Fingerprint,
    pub tool_id: String,
    pub tool_version: String,
    pub produced_at: DateTime<Utc>,
    pub payload: Value,
    pub cost: f64,
    pub latency_ms: u64,
    pub success: bool,
    pub error_kind: Option<ErrorKind>,
}

impl ToolResult {
    pub fn success(
        fingerprint: Fingerprint,
        metadata: &ToolMetadata,
        payload: Value,
        cost: f64,
        latency_ms: u64,
    ) -> Self {
        Self {
            fingerprint,
            tool_id: metadata.id.clone(),
            tool_version: metadata.version.clone(),
            produced_at: Utc::now(),
            payload,
            cost,
            latency_ms,
            success: true,
            error_kind: None,
        }
    }
}

/// A single-purpose analytic component.
///
/// `validate` runs after framework-side schema validation and carries any
/// semantic checks the schema cannot express. `execute` must check the
/// context's cancellation signal before I/O and at loop boundaries.
#[async_trait]
pub trait Tool: Send + Sync {
    fn metadata(&self) -> &ToolMetadata;

    fn validate(&self, _input: &Value) -> Result<(), ToolError> {
        Ok(())
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError>;
}
