//! Filing parse tool: raw XML in, cached typed filing out.

use async_trait::async_trait;
use serde_json::{json, Value};

use grantscout_core::{Capability, CostModel, FormKind, Tool, ToolContext, ToolError, ToolMetadata};
use grantscout_filings::{parse_filing, ParserOptions};

pub struct FilingParseTool {
    options: ParserOptions,
    metadata: ToolMetadata,
}

impl FilingParseTool {
    pub const ID: &'static str = "filing_parse";

    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            metadata: ToolMetadata {
                id: Self::ID.to_string(),
                version: "1.0.0".to_string(),
                description: "Parse a raw IRS filing XML document into structured records"
                    .to_string(),
                capability: Capability::ReadsExternal,
                cost: CostModel { per_call: 0.0 },
                input_schema: json!({
                    "type": "object",
                    "required": ["xml"],
                    "properties": {
                        "xml": {"type": "string"},
                        "declared_kind": {
                            "enum": ["form990", "form990_pf", "form990_ez"]
                        }
                    },
                    "additionalProperties": false
                }),
                output_schema: json!({
                    "type": "object",
                    "required": ["key", "officers", "grants", "quality"],
                    "properties": {
                        "key": {"type": "object"},
                        "officers": {"type": "array"},
                        "grants": {"type": "array"},
                        "quality": {"type": "object"}
                    }
                }),
                dependencies: vec![],
                // Filings are immutable once parsed.
                cache_ttl_secs: None,
            },
        }
    }
}

fn declared_kind(input: &Value) -> Result<Option<FormKind>, ToolError> {
    match input.get("declared_kind").and_then(|v| v.as_str()) {
        None => Ok(None),
        Some(raw) => serde_json::from_value(Value::String(raw.to_string()))
            .map(Some)
            .map_err(|_| ToolError::invalid_arguments(format!("unknown form kind '{raw}'"))),
    }
}

#[async_trait]
impl Tool for FilingParseTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        ctx.checkpoint()?;
        let xml = input
            .get("xml")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::invalid_arguments("xml payload is required"))?;
        let declared = declared_kind(&input)?;

        let filing = parse_filing(xml.as_bytes(), declared, &self.options).map_err(ToolError::from)?;

        // Write-through: later tools read the parsed filing by key.
        let stored = ctx.store.put_filing(filing);
        serde_json::to_value(stored.as_ref())
            .map_err(|e| ToolError::transient(format!("failed to serialize filing: {e}")))
    }
}
