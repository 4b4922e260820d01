//! The funnel orchestrator: fast pass, survivor selection, thorough pass,
//! budget enforcement, and deterministic output ordering.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use grantscout_config::ScoringTables;
use grantscout_core::{
    Capability, CompositeScore, CostModel, ErrorKind, Recommendation, Tool, ToolContext,
    ToolError, ToolMetadata,
};
use grantscout_scoring::build_triage_item;

use crate::registry::{InvokeOptions, ToolInvoker, ToolRegistry};

use super::{FastScreenTool, ThoroughScreenTool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Fast,
    Thorough,
    Both,
}

impl Mode {
    fn parse(raw: Option<&str>) -> Result<Self, ToolError> {
        match raw.unwrap_or("both") {
            "fast" => Ok(Mode::Fast),
            "thorough" => Ok(Mode::Thorough),
            "both" => Ok(Mode::Both),
            other => Err(ToolError::invalid_arguments(format!(
                "unknown screening mode '{other}'"
            ))),
        }
    }
}

/// Outcome for one opportunity in one pass.
#[derive(Debug, Clone)]
enum PassOutcome {
    Scored(Box<CompositeScore>),
    Deferred,
    Failed(ErrorKind),
}

pub struct ScreenFunnelTool {
    registry: Weak<ToolRegistry>,
    tables: Arc<ScoringTables>,
    concurrency: usize,
    metadata: ToolMetadata,
}

impl ScreenFunnelTool {
    pub const ID: &'static str = "screen_funnel";

    pub fn new(
        registry: Weak<ToolRegistry>,
        tables: Arc<ScoringTables>,
        concurrency: usize,
    ) -> Self {
        Self {
            registry,
            tables,
            concurrency: concurrency.max(1),
            metadata: ToolMetadata {
                id: Self::ID.to_string(),
                version: "1.0.0".to_string(),
                description: "Two-pass screening funnel with budget enforcement".to_string(),
                capability: Capability::ReadsExternal,
                cost: CostModel { per_call: 0.0 },
                input_schema: json!({
                    "type": "object",
                    "required": ["profile", "opportunities"],
                    "properties": {
                        "profile": {"type": "object"},
                        "opportunities": {"type": "array", "items": {"type": "object"}},
                        "mode": {"enum": ["fast", "thorough", "both"]},
                        "threshold": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                        "max_opportunities": {"type": "integer", "minimum": 1}
                    },
                    "additionalProperties": false
                }),
                output_schema: json!({
                    "type": "object",
                    "required": ["results", "recommended"],
                    "properties": {
                        "results": {"type": "array"},
                        "recommended": {"type": "array"}
                    }
                }),
                dependencies: vec![FastScreenTool::ID.to_string(), ThoroughScreenTool::ID.to_string()],
                cache_ttl_secs: None,
            },
        }
    }

    fn invoker(&self) -> Result<Arc<ToolRegistry>, ToolError> {
        self.registry
            .upgrade()
            .ok_or_else(|| ToolError::transient("tool registry has shut down"))
    }

    /// Run one pass over a set of opportunities with bounded concurrency.
    /// Output is aligned with the input order. Once the budget refuses a
    /// reservation, every not-yet-started opportunity is Deferred.
    async fn run_pass(
        &self,
        tool_id: &str,
        profile: &Value,
        opportunities: &[Value],
        ctx: &ToolContext,
    ) -> Result<Vec<PassOutcome>, ToolError> {
        let invoker = self.invoker()?;
        let planned = invoker.planned_cost(tool_id).unwrap_or(0.0);
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let exhausted = Arc::new(AtomicBool::new(false));

        let mut join: JoinSet<(usize, PassOutcome)> = JoinSet::new();
        for (position, opportunity) in opportunities.iter().enumerate() {
            let invoker = invoker.clone();
            let semaphore = semaphore.clone();
            let exhausted = exhausted.clone();
            let ctx = ctx.clone();
            let tool_id = tool_id.to_string();
            let input = json!({
                "profile": profile,
                "opportunity": opportunity,
            });

            join.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (position, PassOutcome::Failed(ErrorKind::Transient));
                };
                if ctx.cancel.is_cancelled() {
                    return (position, PassOutcome::Failed(ErrorKind::Cancelled));
                }
                if exhausted.load(Ordering::SeqCst) {
                    return (position, PassOutcome::Deferred);
                }
                // Budget pre-check; the reservation inside invoke is the
                // authoritative gate.
                if let Some(remaining) = ctx.cost.remaining() {
                    if remaining < planned {
                        exhausted.store(true, Ordering::SeqCst);
                        return (position, PassOutcome::Deferred);
                    }
                }

                match invoker
                    .invoke(&tool_id, input, &ctx, InvokeOptions::default())
                    .await
                {
                    Ok(result) => match serde_json::from_value::<CompositeScore>(
                        result.payload["score"].clone(),
                    ) {
                        Ok(score) => (position, PassOutcome::Scored(Box::new(score))),
                        Err(_) => (position, PassOutcome::Failed(ErrorKind::InvalidArguments)),
                    },
                    Err(err) if err.kind() == ErrorKind::BudgetExceeded => {
                        exhausted.store(true, Ordering::SeqCst);
                        (position, PassOutcome::Deferred)
                    }
                    Err(err) => (position, PassOutcome::Failed(err.kind())),
                }
            });
        }

        let mut outcomes: Vec<PassOutcome> = vec![PassOutcome::Deferred; opportunities.len()];
        while let Some(joined) = join.join_next().await {
            match joined {
                Ok((position, outcome)) => outcomes[position] = outcome,
                Err(join_error) => {
                    tracing::error!(error = %join_error, "screening task panicked");
                }
            }
        }
        Ok(outcomes)
    }
}

fn opportunity_id(value: &Value) -> String {
    value
        .get("id")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn opportunity_amount(value: &Value) -> Option<f64> {
    let amount = value.get("amount")?;
    match (
        amount.get("min").and_then(|v| v.as_f64()),
        amount.get("max").and_then(|v| v.as_f64()),
    ) {
        (Some(lo), Some(hi)) => Some((lo + hi) / 2.0),
        (Some(lo), None) => Some(lo),
        (None, Some(hi)) => Some(hi),
        (None, None) => None,
    }
}

#[async_trait]
impl Tool for ScreenFunnelTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        ctx.checkpoint()?;
        let mode = Mode::parse(input.get("mode").and_then(|v| v.as_str()))?;
        let threshold = input
            .get("threshold")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.5);
        let max = input
            .get("max_opportunities")
            .and_then(|v| v.as_u64())
            .unwrap_or(500) as usize;

        let profile = input
            .get("profile")
            .cloned()
            .ok_or_else(|| ToolError::invalid_arguments("profile is required"))?;
        let all: Vec<Value> = input
            .get("opportunities")
            .and_then(|v| v.as_array())
            .cloned()
            .ok_or_else(|| ToolError::invalid_arguments("opportunities array is required"))?;

        if all.len() > max {
            tracing::warn!(
                dropped = all.len() - max,
                max,
                "screening batch truncated to the configured maximum"
            );
        }
        let opportunities: Vec<Value> = all.into_iter().take(max).collect();

        // Per-opportunity report rows, built up across passes.
        let mut rows: Vec<Map<String, Value>> = opportunities
            .iter()
            .map(|opp| {
                let mut row = Map::new();
                row.insert("opportunity_id".to_string(), json!(opportunity_id(opp)));
                row.insert("status".to_string(), json!("pending"));
                row
            })
            .collect();

        // Pass 1.
        let mut survivor_positions: Vec<usize> = (0..opportunities.len()).collect();
        if mode != Mode::Thorough {
            let outcomes = self
                .run_pass(FastScreenTool::ID, &profile, &opportunities, ctx)
                .await?;
            survivor_positions.clear();
            for (position, outcome) in outcomes.iter().enumerate() {
                match outcome {
                    PassOutcome::Scored(score) => {
                        rows[position].insert("fast".to_string(), json!(score));
                        if score.overall >= threshold {
                            rows[position].insert("status".to_string(), json!("scored"));
                            survivor_positions.push(position);
                        } else {
                            rows[position].insert("status".to_string(), json!("screened_out"));
                        }
                    }
                    PassOutcome::Deferred => {
                        rows[position].insert("status".to_string(), json!("deferred"));
                    }
                    PassOutcome::Failed(kind) => {
                        rows[position].insert("status".to_string(), json!("failed"));
                        rows[position].insert("error".to_string(), json!(kind.as_str()));
                    }
                }
            }
        } else {
            for row in &mut rows {
                row.insert("status".to_string(), json!("scored"));
            }
        }

        // Pass 2 over survivors.
        let mut final_scores: Vec<(usize, CompositeScore)> = Vec::new();
        if mode != Mode::Fast {
            let survivors: Vec<Value> = survivor_positions
                .iter()
                .map(|p| opportunities[*p].clone())
                .collect();
            let outcomes = self
                .run_pass(ThoroughScreenTool::ID, &profile, &survivors, ctx)
                .await?;
            for (survivor_index, outcome) in outcomes.iter().enumerate() {
                let position = survivor_positions[survivor_index];
                match outcome {
                    PassOutcome::Scored(score) => {
                        rows[position].insert("thorough".to_string(), json!(score));
                        rows[position].insert("status".to_string(), json!("scored"));
                        final_scores.push((position, (**score).clone()));
                    }
                    PassOutcome::Deferred => {
                        rows[position].insert("status".to_string(), json!("deferred"));
                    }
                    PassOutcome::Failed(kind) => {
                        rows[position].insert("status".to_string(), json!("failed"));
                        rows[position].insert("error".to_string(), json!(kind.as_str()));
                    }
                }
            }
        } else {
            for position in &survivor_positions {
                if let Some(score) = rows[*position]
                    .get("fast")
                    .and_then(|s| serde_json::from_value::<CompositeScore>(s.clone()).ok())
                {
                    final_scores.push((*position, score));
                }
            }
        }

        // Borderline outcomes enter the triage queue once per run.
        let run_id = ctx
            .run_id
            .clone()
            .unwrap_or_else(|| ctx.correlation_id.to_string());
        for (position, score) in &final_scores {
            if score.recommendation == Recommendation::Abstain {
                let opportunity = &opportunities[*position];
                if let Some(item) = build_triage_item(
                    &self.tables,
                    &run_id,
                    &opportunity_id(opportunity),
                    score,
                    opportunity_amount(opportunity),
                ) {
                    ctx.store.enqueue_triage(item);
                }
            }
        }

        // Deterministic ordering: composite descending, ties by id ascending.
        let mut recommended: Vec<Value> = final_scores
            .iter()
            .map(|(position, score)| {
                json!({
                    "opportunity_id": opportunity_id(&opportunities[*position]),
                    "overall": score.overall,
                    "recommendation": score.recommendation,
                })
            })
            .collect();
        recommended.sort_by(|a, b| {
            let overall_a = a["overall"].as_f64().unwrap_or(0.0);
            let overall_b = b["overall"].as_f64().unwrap_or(0.0);
            overall_b
                .partial_cmp(&overall_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    a["opportunity_id"]
                        .as_str()
                        .unwrap_or("")
                        .cmp(b["opportunity_id"].as_str().unwrap_or(""))
                })
        });

        Ok(json!({
            "results": rows,
            "recommended": recommended,
        }))
    }
}
