//! Financial intelligence over cached filings.

use async_trait::async_trait;
use serde_json::{json, Value};

use grantscout_core::{Capability, CostModel, Tool, ToolContext, ToolError, ToolMetadata};

use super::{ein_input_schema, object_output_schema, sponsor_ein};

pub struct FinancialIntelTool {
    metadata: ToolMetadata,
}

impl FinancialIntelTool {
    pub const ID: &'static str = "financial_intel";

    pub fn new() -> Self {
        Self {
            metadata: ToolMetadata {
                id: Self::ID.to_string(),
                version: "1.0.0".to_string(),
                description: "Revenue, expense, and capacity analysis from cached filings"
                    .to_string(),
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

impl Default for FinancialIntelTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FinancialIntelTool {
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

        let latest = &filings[0];
        let financials = &latest.financials;

        let expense_ratios = financials.total_expenses.filter(|t| *t > 0.0).map(|total| {
            json!({
                "program": financials.program_expenses.map(|p| p / total),
                "admin": financials.admin_expenses.map(|a| a / total),
                "fundraising": financials.fundraising_expenses.map(|f| f / total),
            })
        });

        // Relative year-over-year revenue change across the record.
        let mut revenue_by_year: Vec<(i32, f64)> = filings
            .iter()
            .filter_map(|f| f.financials.total_revenue.map(|r| (f.key.tax_year, r)))
            .collect();
        revenue_by_year.sort_by_key(|(year, _)| *year);
        let revenue_trend = match (revenue_by_year.first(), revenue_by_year.last()) {
            (Some((y0, r0)), Some((y1, r1))) if y1 > y0 && *r0 > 0.0 => {
                Some((r1 - r0) / r0 / f64::from(y1 - y0))
            }
            _ => None,
        };

        // Rough payout capacity: the five percent minimum distribution on
        // the asset base.
        let grantmaking_capacity = financials.total_assets.map(|a| a * 0.05);

        Ok(json!({
            "ein": ein,
            "years_on_record": filings.len(),
            "latest": {
                "tax_year": latest.key.tax_year,
                "form": latest.key.kind,
                "total_revenue": financials.total_revenue,
                "total_expenses": financials.total_expenses,
                "total_assets": financials.total_assets,
                "net_assets": financials.net_assets,
                "contributions": financials.contributions,
            },
            "expense_ratios": expense_ratios,
            "revenue_trend_per_year": revenue_trend,
            "grantmaking_capacity": grantmaking_capacity,
            "quality": latest.quality.financial_completeness,
        }))
    }
}
