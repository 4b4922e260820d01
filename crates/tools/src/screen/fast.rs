//! Pass 1: cheap screen over profile metadata and the opportunity summary.

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

const PROMPT: &str = "Rate how well the nonprofit below fits the funding opportunity. \
Mission: {mission}. Focus areas: {focus_areas}. Opportunity: {title}. \
Score each requested dimension from 0 to 1.";

pub struct FastScreenTool {
    tables: Arc<ScoringTables>,
    backend: Arc<dyn InferenceBackend>,
    prompt: PromptTemplate,
    metadata: ToolMetadata,
}

impl FastScreenTool {
    pub const ID: &'static str = "fast_screen";
    pub const COST: f64 = 0.0005;

    pub fn new(tables: Arc<ScoringTables>, backend: Arc<dyn InferenceBackend>) -> Self {
        Self {
            tables,
            backend,
            prompt: PromptTemplate::new(PROMPT),
            metadata: ToolMetadata {
                id: Self::ID.to_string(),
                version: "1.0.0".to_string(),
                description: "Fast discover-stage screen from profile metadata and the \
                              opportunity summary"
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
}

#[async_trait]
impl Tool for FastScreenTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        ctx.checkpoint()?;
        let profile = profile_from(&input)?;
        let opportunity = opportunity_from(&input)?;

        let dimensions: Vec<&String> = self
            .tables
            .stage(ScoringStage::Discover)
            .map(|w| w.dimensions.keys().collect())
            .unwrap_or_default();

        let mut bindings = HashMap::new();
        bindings.insert("mission".to_string(), profile.mission.clone());
        bindings.insert("focus_areas".to_string(), profile.focus_areas.join(", "));
        bindings.insert("title".to_string(), opportunity.title.clone());
        let prompt = self.prompt.render(&bindings)?;

        let request = InferenceRequest::new(
            prompt,
            json!({
                "profile": input["profile"],
                "opportunity": input["opportunity"],
                "dimensions": dimensions,
            }),
        )
        .with_output_schema(self.metadata.output_schema.clone());

        let response = self.backend.generate(request, &ctx.cancel).await?;
        let inputs = dimension_inputs_from(&response.payload)?;

        let score = StageScorer::new(&self.tables).score(
            ScoringStage::Discover,
            track_for(opportunity.channel),
            &inputs,
            Enhancements::default(),
            vec![],
        );

        Ok(json!({
            "opportunity_id": opportunity.id,
            "score": score,
        }))
    }
}
