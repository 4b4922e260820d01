//! Grant-schedule analysis: distribution, top recipients, and recipient
//! NTEE codes resolved through the master file.

use async_trait::async_trait;
use serde_json::{json, Value};

use grantscout_bmf::SharedBmfIndex;
use grantscout_core::{Capability, CostModel, Tool, ToolContext, ToolError, ToolMetadata};

use super::{ein_input_schema, object_output_schema, sponsor_ein};

pub struct ScheduleIAnalyzerTool {
    bmf: Option<SharedBmfIndex>,
    metadata: ToolMetadata,
}

impl ScheduleIAnalyzerTool {
    pub const ID: &'static str = "schedule_i_analyzer";

    pub fn new(bmf: Option<SharedBmfIndex>) -> Self {
        Self {
            bmf,
            metadata: ToolMetadata {
                id: Self::ID.to_string(),
                version: "1.0.0".to_string(),
                description: "Grant distribution and recipient profile from the grant schedule"
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

#[async_trait]
impl Tool for ScheduleIAnalyzerTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        ctx.checkpoint()?;
        let ein = sponsor_ein(&input)?;
        let latest = ctx
            .store
            .latest_filing(&ein)
            .ok_or_else(|| ToolError::not_found(format!("no filings cached for {ein}")))?;

        if latest.grants.is_empty() {
            return Ok(json!({
                "ein": ein,
                "grant_count": 0,
                "total_amount": 0.0,
                "note": "no grants reported on the most recent filing",
            }));
        }

        let mut amounts: Vec<f64> = latest.grants.iter().map(|g| g.amount).collect();
        amounts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let total: f64 = amounts.iter().sum();
        let median = amounts[amounts.len() / 2];

        let mut top: Vec<&grantscout_core::Grant> = latest.grants.iter().collect();
        top.sort_by(|a, b| {
            b.amount
                .partial_cmp(&a.amount)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.recipient_canonical_name.cmp(&b.recipient_canonical_name))
        });
        let top_recipients: Vec<Value> = top
            .iter()
            .take(10)
            .map(|grant| {
                json!({
                    "name": grant.recipient_canonical_name,
                    "amount": grant.amount,
                    "purpose": grant.purpose,
                })
            })
            .collect();

        // Recipient NTEE codes via master-file lookup, for the strategic
        // coherence analysis downstream.
        let recipient_ntee_codes: Vec<String> = match &self.bmf {
            Some(bmf) => {
                let snapshot = bmf.snapshot();
                latest
                    .grants
                    .iter()
                    .filter_map(|grant| grant.recipient_ein.as_deref())
                    .filter_map(|recipient_ein| snapshot.by_ein(recipient_ein))
                    .filter_map(|record| record.ntee.as_ref().map(|n| n.as_str().to_string()))
                    .collect()
            }
            None => Vec::new(),
        };

        Ok(json!({
            "ein": ein,
            "grant_count": latest.grants.len(),
            "total_amount": total,
            "typical_grant": median,
            "largest_grant": amounts.last(),
            "smallest_grant": amounts.first(),
            "top_recipients": top_recipients,
            "recipient_ntee_codes": recipient_ntee_codes,
            "tax_year": latest.key.tax_year,
        }))
    }
}
