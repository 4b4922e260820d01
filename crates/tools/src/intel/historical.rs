//! Historical funding analysis across every cached year.

use async_trait::async_trait;
use serde_json::{json, Value};

use grantscout_core::{Capability, CostModel, Tool, ToolContext, ToolError, ToolMetadata};

use super::{ein_input_schema, object_output_schema, sponsor_ein};

pub struct HistoricalFundingTool {
    metadata: ToolMetadata,
}

impl HistoricalFundingTool {
    pub const ID: &'static str = "historical_funding";

    pub fn new() -> Self {
        Self {
            metadata: ToolMetadata {
                id: Self::ID.to_string(),
                version: "1.0.0".to_string(),
                description: "Multi-year grantmaking volume and trend".to_string(),
                capability: Capability::ReadsExternal,
                cost: CostModel { per_call: 0.0 },
                input_schema: ein_input_schema(),
                output_schema: object_output_schema(),
                dependencies: vec![],
                cache_ttl_secs: Some(24 * 60 * 60),
            },
        }
    }
}

impl Default for HistoricalFundingTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for HistoricalFundingTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        ctx.checkpoint()?;
        let ein = sponsor_ein(&input)?;
        let filings = ctx.store.filings_for(&ein);
        if filings.is_empty() {
            return Err(ToolError::not_found(format!("no filings cached for {ein}")));
        }

        let mut by_year: Vec<Value> = filings
            .iter()
            .map(|filing| {
                json!({
                    "tax_year": filing.key.tax_year,
                    "total": filing.total_grants(),
                    "count": filing.grants.len(),
                })
            })
            .collect();
        by_year.sort_by_key(|y| y["tax_year"].as_i64());

        let totals: Vec<f64> = by_year
            .iter()
            .filter_map(|y| y["total"].as_f64())
            .collect();
        let trend = match (totals.first(), totals.last()) {
            (Some(first), Some(last)) if totals.len() >= 2 => {
                if *last > first * 1.1 {
                    "increasing"
                } else if *last < first * 0.9 {
                    "decreasing"
                } else {
                    "stable"
                }
            }
            _ => "insufficient_history",
        };

        let active_years: Vec<i64> = by_year
            .iter()
            .filter(|y| y["count"].as_u64().unwrap_or(0) > 0)
            .filter_map(|y| y["tax_year"].as_i64())
            .collect();

        Ok(json!({
            "ein": ein,
            "by_year": by_year,
            "trend": trend,
            "active_years": active_years,
            "years_on_record": filings.len(),
        }))
    }
}
