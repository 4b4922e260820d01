//! Network intelligence: influence-ranked people and board interlocks.

use async_trait::async_trait;
use serde_json::{json, Value};

use grantscout_core::{Capability, CostModel, Tool, ToolContext, ToolError, ToolMetadata};

use super::{ein_input_schema, object_output_schema, sponsor_ein};

pub struct NetworkIntelTool {
    metadata: ToolMetadata,
}

impl NetworkIntelTool {
    pub const ID: &'static str = "network_intel";

    pub fn new() -> Self {
        Self {
            metadata: ToolMetadata {
                id: Self::ID.to_string(),
                version: "1.0.0".to_string(),
                description: "Officer influence ranking and cross-organization interlocks"
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

impl Default for NetworkIntelTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for NetworkIntelTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        ctx.checkpoint()?;
        let ein = sponsor_ein(&input)?;
        let extended = input
            .get("extended")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let filings = ctx.store.filings_for(&ein);
        let latest = filings
            .first()
            .ok_or_else(|| ToolError::not_found(format!("no filings cached for {ein}")))?;

        let mut ranked: Vec<_> = latest.officers.iter().collect();
        ranked.sort_by(|a, b| {
            b.influence
                .partial_cmp(&a.influence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.canonical_name.cmp(&b.canonical_name))
        });

        let key_people: Vec<Value> = ranked
            .iter()
            .take(10)
            .map(|officer| {
                json!({
                    "name": officer.canonical_name,
                    "title": officer.title,
                    "role": officer.role,
                    "influence": officer.influence,
                })
            })
            .collect();

        // Interlocks: people from this board appearing on other cached
        // boards, matched by canonical name.
        let mut interlocks: Vec<Value> = Vec::new();
        for other_ein in ctx.store.filing_eins() {
            ctx.cancel.check()?;
            if other_ein == ein {
                continue;
            }
            let Some(other) = ctx.store.latest_filing(&other_ein) else {
                continue;
            };
            for officer in &latest.officers {
                if officer.canonical_name.is_empty() {
                    continue;
                }
                if other
                    .officers
                    .iter()
                    .any(|o| o.canonical_name == officer.canonical_name)
                {
                    interlocks.push(json!({
                        "name": officer.canonical_name,
                        "other_ein": other_ein,
                        "other_organization": other.organization_name,
                    }));
                }
            }
        }
        interlocks.sort_by(|a, b| {
            a["name"]
                .as_str()
                .cmp(&b["name"].as_str())
                .then_with(|| a["other_ein"].as_str().cmp(&b["other_ein"].as_str()))
        });

        // Extended pathways: for each interlocked person, where else their
        // counterpart board reaches.
        let pathways = if extended {
            let mut reachable: Vec<String> = interlocks
                .iter()
                .filter_map(|i| i["other_ein"].as_str().map(String::from))
                .collect();
            reachable.sort();
            reachable.dedup();
            Some(json!({
                "second_degree_orgs": reachable.len(),
                "reachable_eins": reachable,
            }))
        } else {
            None
        };

        Ok(json!({
            "ein": ein,
            "board_size": latest.officers.len(),
            "key_people": key_people,
            "interlocks": interlocks,
            "extended_pathways": pathways,
        }))
    }
}
