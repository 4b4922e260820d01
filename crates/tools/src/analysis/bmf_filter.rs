//! Master-file filtering as a tool.

use async_trait::async_trait;
use serde_json::{json, Value};

use grantscout_bmf::{FilterCriteria, SharedBmfIndex};
use grantscout_core::{Capability, CostModel, Tool, ToolContext, ToolError, ToolMetadata};

pub struct BmfFilterTool {
    index: SharedBmfIndex,
    metadata: ToolMetadata,
}

impl BmfFilterTool {
    pub const ID: &'static str = "bmf_filter";

    pub fn new(index: SharedBmfIndex) -> Self {
        Self {
            index,
            metadata: ToolMetadata {
                id: Self::ID.to_string(),
                version: "1.0.0".to_string(),
                description: "Filter the Business Master File by state, NTEE, revenue, assets, \
                              foundation type, and name"
                    .to_string(),
                capability: Capability::ReadsExternal,
                cost: CostModel { per_call: 0.0 },
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "states": {"type": "array", "items": {"type": "string"}},
                        "nationwide": {"type": "boolean"},
                        "ntee_prefixes": {"type": "array", "items": {"type": "string"}},
                        "revenue_min": {"type": "number"},
                        "revenue_max": {"type": "number"},
                        "asset_min": {"type": "number"},
                        "asset_max": {"type": "number"},
                        "private_foundation": {"type": "boolean"},
                        "name_contains": {"type": "string"}
                    },
                    "additionalProperties": false
                }),
                output_schema: json!({
                    "type": "object",
                    "required": ["rows", "performance"],
                    "properties": {
                        "rows": {"type": "array"},
                        "performance": {"type": "object"}
                    }
                }),
                dependencies: vec![],
                cache_ttl_secs: Some(60 * 60),
            },
        }
    }
}

#[async_trait]
impl Tool for BmfFilterTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        ctx.checkpoint()?;
        let criteria: FilterCriteria = serde_json::from_value(input)
            .map_err(|e| ToolError::invalid_arguments(format!("bad filter criteria: {e}")))?;

        let outcome = self.index.snapshot().filter(&criteria);
        serde_json::to_value(&outcome)
            .map_err(|e| ToolError::transient(format!("failed to serialize filter outcome: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{InvokeOptions, RegistryConfig, ToolInvoker, ToolRegistry};
    use grantscout_bmf::{BmfIndex, BmfRecord};
    use grantscout_budget::RunBudget;
    use grantscout_core::normalize::NteeCode;
    use grantscout_store::MemoryStore;
    use std::sync::Arc;

    fn index() -> SharedBmfIndex {
        let records = vec![
            BmfRecord {
                ein: "54-0000001".into(),
                name: "SHENANDOAH LITERACY PROJECT".into(),
                city: "RICHMOND".into(),
                state: "VA".into(),
                ntee: NteeCode::parse("P20"),
                revenue: 900_000.0,
                assets: 1_500_000.0,
                is_private_foundation: false,
            },
            BmfRecord {
                ein: "54-0000002".into(),
                name: "TIDEWATER RELIEF".into(),
                city: "NORFOLK".into(),
                state: "VA".into(),
                ntee: NteeCode::parse("P20"),
                revenue: 300_000.0,
                assets: 200_000.0,
                is_private_foundation: false,
            },
        ];
        SharedBmfIndex::new(BmfIndex::build(records))
    }

    #[tokio::test]
    async fn filter_tool_end_to_end() {
        let registry = ToolRegistry::new(RegistryConfig::default());
        registry.register(Arc::new(BmfFilterTool::new(index()))).unwrap();
        let ctx = grantscout_core::ToolContext::new(
            Arc::new(RunBudget::unlimited()),
            MemoryStore::shared(Default::default()),
        );

        let result = registry
            .invoke(
                "bmf_filter",
                serde_json::json!({
                    "states": ["VA"],
                    "ntee_prefixes": ["P20"],
                    "revenue_min": 500000.0
                }),
                &ctx,
                InvokeOptions::default(),
            )
            .await
            .unwrap();

        let rows = result.payload["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["ein"], "54-0000001");
        assert!(result.payload["performance"]["rows_scanned"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn unknown_criteria_key_is_schema_violation() {
        let registry = ToolRegistry::new(RegistryConfig::default());
        registry.register(Arc::new(BmfFilterTool::new(index()))).unwrap();
        let ctx = grantscout_core::ToolContext::new(
            Arc::new(RunBudget::unlimited()),
            MemoryStore::shared(Default::default()),
        );

        let err = registry
            .invoke(
                "bmf_filter",
                serde_json::json!({"state": "VA"}),
                &ctx,
                InvokeOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), grantscout_core::ErrorKind::InvalidArguments);
    }
}
