//! Risk intelligence: governance posture, filing gaps, extraction quality.

use async_trait::async_trait;
use serde_json::{json, Value};

use grantscout_core::{Capability, CostModel, Tool, ToolContext, ToolError, ToolMetadata};

use super::{ein_input_schema, object_output_schema, sponsor_ein};

pub struct RiskIntelTool {
    metadata: ToolMetadata,
}

impl RiskIntelTool {
    pub const ID: &'static str = "risk_intel";

    pub fn new() -> Self {
        Self {
            metadata: ToolMetadata {
                id: Self::ID.to_string(),
                version: "1.0.0".to_string(),
                description: "Governance and continuity risk factors from cached filings"
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

impl Default for RiskIntelTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for RiskIntelTool {
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
        let mut factors: Vec<Value> = Vec::new();

        let governance = &latest.governance;
        for (name, flag) in [
            ("conflict_of_interest_policy", governance.conflict_of_interest_policy),
            ("whistleblower_policy", governance.whistleblower_policy),
            ("document_retention_policy", governance.document_retention_policy),
        ] {
            if flag == Some(false) {
                factors.push(json!({
                    "factor": name,
                    "severity": 0.5,
                    "detail": "policy reported absent",
                }));
            }
        }

        // Gaps in the filing record inside its own span.
        let mut years: Vec<i32> = filings.iter().map(|f| f.key.tax_year).collect();
        years.sort_unstable();
        years.dedup();
        if let (Some(first), Some(last)) = (years.first(), years.last()) {
            let expected = (last - first + 1) as usize;
            let missing = expected.saturating_sub(years.len());
            if missing > 0 {
                factors.push(json!({
                    "factor": "filing_gaps",
                    "severity": (0.2 * missing as f64).min(0.8),
                    "detail": format!("{missing} missing year(s) between {first} and {last}"),
                }));
            }
        }

        if latest.quality.overall < 0.5 {
            factors.push(json!({
                "factor": "extraction_quality",
                "severity": 0.3,
                "detail": "latest filing parsed with low confidence",
            }));
        }

        let risk_score = if factors.is_empty() {
            0.0
        } else {
            let sum: f64 = factors
                .iter()
                .filter_map(|f| f["severity"].as_f64())
                .sum();
            (sum / factors.len() as f64).clamp(0.0, 1.0)
        };

        Ok(json!({
            "ein": ein,
            "risk_score": risk_score,
            "factors": factors,
        }))
    }
}
