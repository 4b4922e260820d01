//! Foundation-track composite scoring as a tool.
//!
//! Facts can arrive pre-gathered (usually from the deep-intelligence
//! sections) or be derived from cached filings when absent. Abstain
//! outcomes enter the triage queue under the invoking run.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use grantscout_config::{ScoringTables, StateAdjacency};
use grantscout_core::{
    Capability, CostModel, Profile, Recommendation, Tool, ToolContext, ToolError, ToolMetadata,
};
use grantscout_scoring::{
    build_triage_item, FoundationFacts, FoundationScorer, SafeguardFacts, Safeguards,
};

pub struct FoundationScoreTool {
    tables: Arc<ScoringTables>,
    adjacency: Arc<StateAdjacency>,
    metadata: ToolMetadata,
}

impl FoundationScoreTool {
    pub const ID: &'static str = "foundation_score";

    pub fn new(tables: Arc<ScoringTables>, adjacency: Arc<StateAdjacency>) -> Self {
        Self {
            tables,
            adjacency,
            metadata: ToolMetadata {
                id: Self::ID.to_string(),
                version: "1.0.0".to_string(),
                description: "Foundation-track composite score for a 990-PF opportunity"
                    .to_string(),
                capability: Capability::ReadsExternal,
                cost: CostModel { per_call: 0.0 },
                input_schema: json!({
                    "type": "object",
                    "required": ["profile", "opportunity"],
                    "properties": {
                        "profile": {"type": "object"},
                        "opportunity": {"type": "object"},
                        "facts": {"type": "object"}
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
                cache_ttl_secs: Some(24 * 60 * 60),
            },
        }
    }

    /// Derive facts from cached filings when the caller supplied none.
    fn derive_facts(&self, ctx: &ToolContext, sponsor_ein: &str) -> FoundationFacts {
        let filings = ctx.store.filings_for(sponsor_ein);
        let Some(latest) = filings.first() else {
            return FoundationFacts::default();
        };

        let mut amounts: Vec<f64> = latest.grants.iter().map(|g| g.amount).collect();
        amounts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let typical_grant = (!amounts.is_empty()).then(|| amounts[amounts.len() / 2]);

        FoundationFacts {
            ntee: None,
            geographic_focus: Vec::new(),
            total_assets: latest.financials.total_assets,
            typical_grant,
            accepts_applications: None,
            latest_filing_year: Some(latest.key.tax_year),
            is_operating: None,
            recipient_ntee_codes: Vec::new(),
            data_quality: Default::default(),
        }
    }

    fn safeguard_facts(
        &self,
        ctx: &ToolContext,
        profile: &Profile,
        facts: &FoundationFacts,
        sponsor_ein: Option<&str>,
    ) -> SafeguardFacts {
        let grant_years = sponsor_ein
            .map(|ein| {
                ctx.store
                    .filings_for(ein)
                    .iter()
                    .filter(|f| !f.grants.is_empty())
                    .map(|f| f.key.tax_year)
                    .collect()
            })
            .unwrap_or_default();

        SafeguardFacts {
            latest_filing_year: facts.latest_filing_year,
            grant_years,
            profile_states: profile.geographic_scope.states.clone(),
            profile_nationwide: profile.geographic_scope.nationwide,
            foundation_focus: facts.geographic_focus.clone(),
        }
    }
}

#[async_trait]
impl Tool for FoundationScoreTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        ctx.checkpoint()?;
        let profile: Profile = serde_json::from_value(input["profile"].clone())
            .map_err(|e| ToolError::invalid_arguments(format!("bad profile: {e}")))?;
        let opportunity_id = input["opportunity"]
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let sponsor_ein = input["opportunity"]
            .get("sponsor_ein")
            .and_then(|v| v.as_str())
            .map(String::from);

        let facts: FoundationFacts = match input.get("facts") {
            Some(raw) => serde_json::from_value(raw.clone())
                .map_err(|e| ToolError::invalid_arguments(format!("bad facts: {e}")))?,
            None => match &sponsor_ein {
                Some(ein) => self.derive_facts(ctx, ein),
                None => FoundationFacts::default(),
            },
        };

        let safeguard_facts =
            self.safeguard_facts(ctx, &profile, &facts, sponsor_ein.as_deref());
        let report =
            Safeguards::new(&self.tables.safeguards, &self.adjacency).evaluate(&safeguard_facts);
        let score = FoundationScorer::new(&self.tables, &self.adjacency)
            .score(&profile, &facts, &report);

        if score.recommendation == Recommendation::Abstain {
            let run_id = ctx
                .run_id
                .clone()
                .unwrap_or_else(|| ctx.correlation_id.to_string());
            let amount = facts.typical_grant;
            if let Some(item) =
                build_triage_item(&self.tables, &run_id, &opportunity_id, &score, amount)
            {
                ctx.store.enqueue_triage(item);
            }
        }

        Ok(json!({
            "opportunity_id": opportunity_id,
            "score": score,
            "safeguards": report,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Utc};
    use grantscout_budget::RunBudget;
    use grantscout_store::MemoryStore;

    fn profile_json() -> Value {
        json!({
            "id": "profile-1",
            "display_name": "Riverside Learning Alliance",
            "ein": "54-1234567",
            "mission": "Expand literacy programs",
            "ntee_codes": ["B25"],
            "geographic_scope": {"states": ["VA"], "nationwide": false},
            "focus_areas": ["education"],
            "annual_revenue": 500000.0,
            "funding_preferences": []
        })
    }

    fn facts_json() -> Value {
        json!({
            "ntee": "B25",
            "geographic_focus": ["VA", "MD", "DC"],
            "total_assets": 5000000.0,
            "typical_grant": 25000.0,
            "accepts_applications": true,
            "latest_filing_year": Utc::now().year() - 1,
            "is_operating": false,
            "recipient_ntee_codes": ["B25", "B25", "B21", "B25"],
            "data_quality": {
                "mission": 0.9, "geographic": 0.9, "financial": 0.9,
                "strategic": 0.7, "timing": 0.9
            }
        })
    }

    #[tokio::test]
    async fn strong_foundation_match_passes() {
        let store = MemoryStore::shared(Default::default());
        let ctx = grantscout_core::ToolContext::new(Arc::new(RunBudget::unlimited()), store)
            .with_run_id("run-f");
        let tool = FoundationScoreTool::new(
            Arc::new(ScoringTables::default()),
            Arc::new(StateAdjacency::empty()),
        );

        // Seed a filing so the grant-history safeguard sees activity.
        ctx.store.put_filing(grantscout_core::Filing {
            key: grantscout_core::FilingKey {
                ein: "30-0219424".into(),
                tax_year: Utc::now().year() - 1,
                kind: grantscout_core::FormKind::Form990Pf,
            },
            organization_name: None,
            officers: vec![],
            grants: vec![grantscout_core::Grant {
                recipient_raw_name: "X".into(),
                recipient_canonical_name: "X".into(),
                recipient_ein: None,
                amount: 25000.0,
                purpose: String::new(),
                tax_year: Utc::now().year() - 1,
            }],
            investments: vec![],
            governance: Default::default(),
            financials: Default::default(),
            quality: Default::default(),
        });
        ctx.store.put_filing(grantscout_core::Filing {
            key: grantscout_core::FilingKey {
                ein: "30-0219424".into(),
                tax_year: Utc::now().year() - 2,
                kind: grantscout_core::FormKind::Form990Pf,
            },
            organization_name: None,
            officers: vec![],
            grants: vec![grantscout_core::Grant {
                recipient_raw_name: "Y".into(),
                recipient_canonical_name: "Y".into(),
                recipient_ein: None,
                amount: 20000.0,
                purpose: String::new(),
                tax_year: Utc::now().year() - 2,
            }],
            investments: vec![],
            governance: Default::default(),
            financials: Default::default(),
            quality: Default::default(),
        });

        let payload = tool
            .execute(
                json!({
                    "profile": profile_json(),
                    "opportunity": {"id": "opp-f", "sponsor_ein": "30-0219424"},
                    "facts": facts_json()
                }),
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(payload["score"]["recommendation"], "pass");
        let overall = payload["score"]["overall"].as_f64().unwrap();
        assert!(overall > 0.75, "overall {overall}");
    }

    #[tokio::test]
    async fn missing_sponsor_ein_abstains_and_triages() {
        let store = MemoryStore::shared(Default::default());
        let ctx = grantscout_core::ToolContext::new(
            Arc::new(RunBudget::unlimited()),
            store.clone(),
        )
        .with_run_id("run-g");
        let tool = FoundationScoreTool::new(
            Arc::new(ScoringTables::default()),
            Arc::new(StateAdjacency::empty()),
        );

        // No sponsor EIN: no NTEE codes can be resolved for the foundation.
        let payload = tool
            .execute(
                json!({
                    "profile": profile_json(),
                    "opportunity": {"id": "opp-anon"}
                }),
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(payload["score"]["recommendation"], "abstain");
        let items = store.triage.snapshot("run-g");
        assert_eq!(items.len(), 1);
        assert!(items[0].reasons.iter().any(|r| r.contains("NTEE")));
    }
}
