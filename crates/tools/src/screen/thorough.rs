//! Pass 2: thorough screen over Pass-1 survivors, with enhancement data
//! pulled from the intelligence store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use grantscout_config::ScoringTables;
use grantscout_core::{
    Capability, CostModel, ScoringStage, Tool, ToolContext, ToolError, ToolMetadata,
};
use grantscout_inference::{InferenceBackend, InferenceRequest, PromptTemplate};
use grantscout_scoring::{Enhancements, StageScorer};

use super::{dimension_inputs_from, opportunity_from, profile_from, track_for};

const PROMPT: &str = "Assess the plan-stage viability of pursuing this funding opportunity. \
Mission: {mission}. Annual revenue: {revenue}. Opportunity: {title}. \
Consider success probability, capacity, financial viability, network leverage, and compliance. \
Score each requested dimension from 0 to 1.";

pub struct ThoroughScreenTool {
    tables: Arc<ScoringTables>,
    backend: Arc<dyn InferenceBackend>,
    prompt: PromptTemplate,
    metadata: ToolMetadata,
}

impl ThoroughScreenTool {
    pub const ID: &'static str = "thorough_screen";
    pub const COST: f64 = 0.02;

    pub fn new(tables: Arc<ScoringTables>, backend: Arc<dyn InferenceBackend>) -> Self {
        Self {
            tables,
            backend,
            prompt: PromptTemplate::new(PROMPT),
            metadata: ToolMetadata {
                id: Self::ID.to_string(),
                version: "1.0.0".to_string(),
                description: "Thorough plan-stage assessment of fast-screen survivors"
                    .to_string(),
                capability: Capability::Billable,
                cost: CostModel {
                    per_call: Self::COST,
                },
                input_schema: json!({
                    "type": "object",
                    "required": ["profile", "opportunity"],
                    "properties": {
                        "profile": {"type": "object"},
                        "opportunity": {"type": "object"}
                    },
                    "additionalProperties": false
                }),
                output_schema: json!({
                    "type": "object",
                    "required": ["opportunity_id", "score"],
                    "properties": {
                        "opportunity_id": {"type": "string"},
                        "score": {"type": "object"}
                    }
                }),
                dependencies: vec![],
                cache_ttl_secs: Some(60 * 60),
            },
        }
    }

    /// Which enhancement data the store already holds for the sponsor.
    fn enhancements_for(&self, ctx: &ToolContext, sponsor_ein: Option<&str>) -> Enhancements {
        let Some(ein) = sponsor_ein else {
            return Enhancements::default();
        };
        let filings = ctx.store.filings_for(ein);
        let latest = filings.first();
        Enhancements {
            financial_data: latest
                .map(|f| f.financials.total_revenue.is_some() || f.financials.total_assets.is_some())
                .unwrap_or(false),
            network_data: latest.map(|f| !f.officers.is_empty()).unwrap_or(false),
            historical_data: filings.len() >= 2,
            risk_assessment: false,
        }
    }
}

#[async_trait]
impl Tool for ThoroughScreenTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        ctx.checkpoint()?;
        let profile = profile_from(&input)?;
        let opportunity = opportunity_from(&input)?;

        let dimensions: Vec<&String> = self
            .tables
            .stage(ScoringStage::Plan)
            .map(|w| w.dimensions.keys().collect())
            .unwrap_or_default();

        let mut bindings = HashMap::new();
        bindings.insert("mission".to_string(), profile.mission.clone());
        bindings.insert(
            "revenue".to_string(),
            profile
                .annual_revenue
                .map(|r| format!("{r:.0}"))
                .unwrap_or_else(|| "unknown".to_string()),
        );
        bindings.insert("title".to_string(), opportunity.title.clone());
        let prompt = self.prompt.render(&bindings)?;

        let request = InferenceRequest::new(
            prompt,
            json!({
                "profile": input["profile"],
                "opportunity": input["opportunity"],
                "dimensions": dimensions,
            }),
        );

        let response = self.backend.generate(request, &ctx.cancel).await?;
        let inputs = dimension_inputs_from(&response.payload)?;
        let enhancements = self.enhancements_for(ctx, opportunity.sponsor_ein.as_deref());

        let score = StageScorer::new(&self.tables).score(
            ScoringStage::Plan,
            track_for(opportunity.channel),
            &inputs,
            enhancements,
            vec![],
        );

        Ok(json!({
            "opportunity_id": opportunity.id,
            "score": score,
        }))
    }
}
