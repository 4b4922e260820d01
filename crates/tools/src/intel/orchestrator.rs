//! Fan-out/fan-in across the intelligence sub-tools.

use std::collections::BTreeMap;
use std::sync::Weak;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::task::JoinSet;

use grantscout_core::{
    Capability, CostModel, ErrorKind, Tool, ToolContext, ToolError, ToolMetadata,
};

use crate::registry::{InvokeOptions, ToolInvoker, ToolRegistry};

use super::{
    FinancialIntelTool, HistoricalFundingTool, NetworkIntelTool, PolicyContextTool, RiskIntelTool,
    ScheduleIAnalyzerTool, StrategicConsultingTool,
};

/// Wall-clock ceilings per depth; the effective deadline is the smaller of
/// these and the remaining workflow deadline.
#[derive(Debug, Clone, Copy)]
pub struct IntelDeadlines {
    pub essentials: Duration,
    pub premium: Duration,
}

impl Default for IntelDeadlines {
    fn default() -> Self {
        Self {
            essentials: Duration::from_secs(30),
            premium: Duration::from_secs(120),
        }
    }
}

pub struct DeepIntelTool {
    registry: Weak<ToolRegistry>,
    deadlines: IntelDeadlines,
    metadata: ToolMetadata,
}

impl DeepIntelTool {
    pub const ID: &'static str = "deep_intel";

    pub fn new(registry: Weak<ToolRegistry>, deadlines: IntelDeadlines) -> Self {
        Self {
            registry,
            deadlines,
            metadata: ToolMetadata {
                id: Self::ID.to_string(),
                version: "1.0.0".to_string(),
                description: "Combined financial, risk, network, grant-schedule, and \
                              historical intelligence for one opportunity"
                    .to_string(),
                capability: Capability::ReadsExternal,
                cost: CostModel { per_call: 0.0 },
                input_schema: json!({
                    "type": "object",
                    "required": ["profile", "opportunity"],
                    "properties": {
                        "profile": {"type": "object"},
                        "opportunity": {"type": "object"},
                        "depth": {"enum": ["essentials", "premium"]},
                        "sponsor_is_private_foundation": {"type": "boolean"}
                    },
                    "additionalProperties": false
                }),
                output_schema: json!({
                    "type": "object",
                    "required": ["depth", "truncated", "completed", "sections"],
                    "properties": {
                        "depth": {"type": "string"},
                        "truncated": {"type": "boolean"},
                        "completed": {"type": "array"},
                        "sections": {"type": "object"}
                    }
                }),
                dependencies: vec![
                    FinancialIntelTool::ID.to_string(),
                    RiskIntelTool::ID.to_string(),
                    NetworkIntelTool::ID.to_string(),
                    ScheduleIAnalyzerTool::ID.to_string(),
                    HistoricalFundingTool::ID.to_string(),
                    PolicyContextTool::ID.to_string(),
                    StrategicConsultingTool::ID.to_string(),
                ],
                cache_ttl_secs: Some(24 * 60 * 60),
            },
        }
    }
}

#[async_trait]
impl Tool for DeepIntelTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        ctx.checkpoint()?;
        let invoker = self
            .registry
            .upgrade()
            .ok_or_else(|| ToolError::transient("tool registry has shut down"))?;

        let depth = input
            .get("depth")
            .and_then(|v| v.as_str())
            .unwrap_or("essentials")
            .to_string();
        let premium = depth == "premium";

        let sponsor_ein = input["opportunity"]
            .get("sponsor_ein")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| {
                ToolError::invalid_arguments("opportunity has no sponsor EIN to analyze")
            })?;
        let is_foundation = input
            .get("sponsor_is_private_foundation")
            .and_then(|v| v.as_bool())
            .unwrap_or_else(|| {
                input["opportunity"].get("channel").and_then(|v| v.as_str()) == Some("foundation")
            });

        let ein_input = json!({ "sponsor_ein": sponsor_ein });
        let pair_input = json!({
            "profile": input["profile"],
            "opportunity": input["opportunity"],
        });

        let mut calls: Vec<(&'static str, String, Value)> = vec![
            ("financial", FinancialIntelTool::ID.to_string(), ein_input.clone()),
            ("risk", RiskIntelTool::ID.to_string(), ein_input.clone()),
            (
                "network",
                NetworkIntelTool::ID.to_string(),
                json!({ "sponsor_ein": sponsor_ein, "extended": premium }),
            ),
            ("historical", HistoricalFundingTool::ID.to_string(), ein_input.clone()),
        ];
        if is_foundation {
            calls.push((
                "schedule_i",
                ScheduleIAnalyzerTool::ID.to_string(),
                ein_input.clone(),
            ));
        }
        if premium {
            calls.push(("policy", PolicyContextTool::ID.to_string(), pair_input.clone()));
            calls.push((
                "consulting",
                StrategicConsultingTool::ID.to_string(),
                pair_input.clone(),
            ));
        }

        // Deadline = min(remaining workflow deadline, per-depth ceiling);
        // sub-tools observe it through the child context.
        let ceiling = if premium {
            self.deadlines.premium
        } else {
            self.deadlines.essentials
        };
        let child = ctx.child_with_timeout(ceiling);

        let mut join: JoinSet<(&'static str, Result<Value, ToolError>)> = JoinSet::new();
        for (name, spec, call_input) in calls {
            let invoker = invoker.clone();
            let child = child.clone();
            join.spawn(async move {
                let outcome = invoker
                    .invoke(&spec, call_input, &child, InvokeOptions::default())
                    .await
                    .map(|result| result.payload);
                (name, outcome)
            });
        }

        let mut sections: BTreeMap<&'static str, Value> = BTreeMap::new();
        let mut completed: Vec<&'static str> = Vec::new();
        let mut truncated = false;
        while let Some(joined) = join.join_next().await {
            let Ok((name, outcome)) = joined else {
                truncated = true;
                continue;
            };
            match outcome {
                Ok(payload) => {
                    completed.push(name);
                    sections.insert(name, payload);
                }
                Err(err) => {
                    if matches!(err.kind(), ErrorKind::Timeout | ErrorKind::Cancelled) {
                        truncated = true;
                    }
                    sections.insert(name, json!({ "error": err.kind().as_str() }));
                }
            }
        }
        completed.sort_unstable();

        Ok(json!({
            "depth": depth,
            "truncated": truncated,
            "completed": completed,
            "sections": sections,
        }))
    }
}
