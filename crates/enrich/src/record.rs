//! Enrichment results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use grantscout_core::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    Ok,
    Failed,
}

/// Organization profile as reported by the explorer API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationSummary {
    pub name: Option<String>,
    pub state: Option<String>,
    pub ntee_code: Option<String>,
    pub revenue: Option<f64>,
    pub assets: Option<f64>,
    /// Most recent tax year with a filing on record.
    pub latest_filing_year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    pub ein: String,
    pub status: EnrichmentStatus,
    pub organization: Option<OrganizationSummary>,
    pub fetched_at: DateTime<Utc>,
    /// Why the lookup terminally failed, when it did.
    pub failure: Option<ErrorKind>,
}

impl EnrichmentRecord {
    pub fn ok(ein: impl Into<String>, organization: OrganizationSummary) -> Self {
        Self {
            ein: ein.into(),
            status: EnrichmentStatus::Ok,
            organization: Some(organization),
            fetched_at: Utc::now(),
            failure: None,
        }
    }

    pub fn failed(ein: impl Into<String>, reason: ErrorKind) -> Self {
        Self {
            ein: ein.into(),
            status: EnrichmentStatus::Failed,
            organization: None,
            fetched_at: Utc::now(),
            failure: Some(reason),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == EnrichmentStatus::Ok
    }
}

/// Extract the fields the pipeline uses from an explorer API response body.
pub(crate) fn summary_from_payload(payload: &Value) -> OrganizationSummary {
    let org = payload.get("organization").unwrap_or(payload);
    let latest_filing_year = payload
        .get("filings_with_data")
        .and_then(|f| f.as_array())
        .and_then(|filings| {
            filings
                .iter()
                .filter_map(|f| f.get("tax_prd_yr").and_then(|y| y.as_i64()))
                .max()
        })
        .map(|y| y as i32);

    OrganizationSummary {
        name: org.get("name").and_then(|v| v.as_str()).map(String::from),
        state: org.get("state").and_then(|v| v.as_str()).map(String::from),
        ntee_code: org
            .get("ntee_code")
            .and_then(|v| v.as_str())
            .map(String::from),
        revenue: org.get("income_amount").and_then(|v| v.as_f64()),
        assets: org.get("asset_amount").and_then(|v| v.as_f64()),
        latest_filing_year,
    }
}
