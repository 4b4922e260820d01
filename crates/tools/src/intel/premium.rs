//! Premium-depth tools backed by external inference.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use grantscout_core::{Capability, CostModel, Tool, ToolContext, ToolError, ToolMetadata};
use grantscout_inference::{InferenceBackend, InferenceRequest, PromptTemplate};

use super::object_output_schema;

fn premium_input_schema() -> Value {
    json!({
        "type": "object",
        "required": ["profile", "opportunity"],
        "properties": {
            "profile": {"type": "object"},
            "opportunity": {"type": "object"}
        },
        "additionalProperties": false
    })
}

fn render_bindings(input: &Value) -> Result<HashMap<String, String>, ToolError> {
    let mission = input["profile"]
        .get("mission")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let title = input["opportunity"]
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    if title.is_empty() {
        return Err(ToolError::invalid_arguments("opportunity title is required"));
    }
    let mut bindings = HashMap::new();
    bindings.insert("mission".to_string(), mission);
    bindings.insert("title".to_string(), title);
    Ok(bindings)
}

/// Policy landscape around the opportunity's program area.
pub struct PolicyContextTool {
    backend: Arc<dyn InferenceBackend>,
    prompt: PromptTemplate,
    metadata: ToolMetadata,
}

impl PolicyContextTool {
    pub const ID: &'static str = "policy_context";
    pub const COST: f64 = 0.01;

    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self {
            backend,
            prompt: PromptTemplate::new(
                "Summarize the policy and funding landscape relevant to the opportunity \
                 {title} for an organization whose mission is: {mission}.",
            ),
            metadata: ToolMetadata {
                id: Self::ID.to_string(),
                version: "1.0.0".to_string(),
                description: "Policy landscape context for a funding opportunity".to_string(),
                capability: Capability::Billable,
                cost: CostModel {
                    per_call: Self::COST,
                },
                input_schema: premium_input_schema(),
                output_schema: object_output_schema(),
                dependencies: vec![],
                cache_ttl_secs: Some(7 * 24 * 60 * 60),
            },
        }
    }
}

#[async_trait]
impl Tool for PolicyContextTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        ctx.checkpoint()?;
        let prompt = self.prompt.render(&render_bindings(&input)?)?;
        let response = self
            .backend
            .generate(InferenceRequest::new(prompt, input), &ctx.cancel)
            .await?;
        Ok(json!({ "context": response.payload }))
    }
}

/// Strategic consulting narrative for premium intelligence.
pub struct StrategicConsultingTool {
    backend: Arc<dyn InferenceBackend>,
    prompt: PromptTemplate,
    metadata: ToolMetadata,
}

impl StrategicConsultingTool {
    pub const ID: &'static str = "strategic_consulting";
    pub const COST: f64 = 0.05;

    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self {
            backend,
            prompt: PromptTemplate::new(
                "Draft an approach strategy for pursuing {title}, tailored to a nonprofit \
                 whose mission is: {mission}. Cover positioning, relationships to build, \
                 and submission sequencing.",
            ),
            metadata: ToolMetadata {
                id: Self::ID.to_string(),
                version: "1.0.0".to_string(),
                description: "Generated approach strategy for a selected opportunity"
                    .to_string(),
                capability: Capability::Billable,
                cost: CostModel {
                    per_call: Self::COST,
                },
                input_schema: premium_input_schema(),
                output_schema: object_output_schema(),
                dependencies: vec![],
                cache_ttl_secs: Some(7 * 24 * 60 * 60),
            },
        }
    }
}

#[async_trait]
impl Tool for StrategicConsultingTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        ctx.checkpoint()?;
        let prompt = self.prompt.render(&render_bindings(&input)?)?;
        let response = self
            .backend
            .generate(InferenceRequest::new(prompt, input), &ctx.cancel)
            .await?;
        Ok(json!({ "strategy": response.payload }))
    }
}
