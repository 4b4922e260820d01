//! The backend contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use grantscout_core::{CancelSignal, ToolError};

/// One inference call: a rendered prompt plus the structured input it was
/// rendered from, and the schema the answer must satisfy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub max_tokens: usize,
    pub temperature: f32,
    /// JSON Schema for the response payload; validated by the tool
    /// framework after the call returns.
    pub output_schema: Option<Value>,
    /// Structured input forwarded verbatim for backends that consume it.
    pub input: Value,
}

impl InferenceRequest {
    pub fn new(prompt: impl Into<String>, input: Value) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            max_tokens: 1024,
            temperature: 0.0,
            output_schema: None,
            input,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResponse {
    /// JSON payload conforming to the request's output schema.
    pub payload: Value,
    pub latency_ms: u64,
}

/// A provider of external inference. Implementations translate transport
/// failures into the core taxonomy (`Transient`, `RateLimited`, `Timeout`).
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn generate(
        &self,
        request: InferenceRequest,
        cancel: &CancelSignal,
    ) -> Result<InferenceResponse, ToolError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}
