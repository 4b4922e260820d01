//! ProPublica enrichment as a tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use grantscout_core::{Capability, CostModel, Tool, ToolContext, ToolError, ToolMetadata};
use grantscout_enrich::ProPublicaClient;

pub struct EnrichOrgTool {
    client: Arc<ProPublicaClient>,
    metadata: ToolMetadata,
}

impl EnrichOrgTool {
    pub const ID: &'static str = "enrich_org";

    pub fn new(client: Arc<ProPublicaClient>) -> Self {
        Self {
            client,
            metadata: ToolMetadata {
                id: Self::ID.to_string(),
                version: "1.0.0".to_string(),
                description: "Look up an organization profile and filing summary by EIN"
                    .to_string(),
                capability: Capability::ReadsExternal,
                cost: CostModel { per_call: 0.0 },
                input_schema: json!({
                    "type": "object",
                    "required": ["ein"],
                    "properties": {"ein": {"type": "string"}},
                    "additionalProperties": false
                }),
                output_schema: json!({
                    "type": "object",
                    "required": ["ein", "status"],
                    "properties": {
                        "ein": {"type": "string"},
                        "status": {"enum": ["ok", "failed"]},
                        "organization": {"type": ["object", "null"]}
                    }
                }),
                dependencies: vec![],
                cache_ttl_secs: Some(7 * 24 * 60 * 60),
            },
        }
    }
}

#[async_trait]
impl Tool for EnrichOrgTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let ein = input
            .get("ein")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::invalid_arguments("ein is required"))?;

        // Terminal failures are values here: the record carries its typed
        // reason and batch callers decide what to do with it.
        let record = self.client.lookup(ein, &ctx.cancel).await;
        serde_json::to_value(&record)
            .map_err(|e| ToolError::transient(format!("failed to serialize enrichment: {e}")))
    }
}
