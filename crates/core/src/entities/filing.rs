//! Parsed IRS filings and the records they own.

use serde::{Deserialize, Serialize};

use crate::normalize::RoleCategory;

/// IRS informational return variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    Form990,
    Form990Pf,
    Form990Ez,
}

impl FormKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormKind::Form990 => "990",
            FormKind::Form990Pf => "990-PF",
            FormKind::Form990Ez => "990-EZ",
        }
    }
}

impl std::fmt::Display for FormKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one filing: (EIN, tax year, form kind).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilingKey {
    pub ein: String,
    pub tax_year: i32,
    pub kind: FormKind,
}

/// A person listed on a filing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Officer {
    pub raw_name: String,
    pub canonical_name: String,
    pub title: String,
    pub role: RoleCategory,
    pub compensation: f64,
    pub weekly_hours: f64,
    pub is_officer: bool,
    pub is_director: bool,
    pub is_voting_member: bool,
    pub is_policy_maker: bool,
    /// Network influence weight in [0, 1].
    pub influence: f64,
}

/// One recipient on a 990-PF Part XV or 990 Schedule I.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    pub recipient_raw_name: String,
    pub recipient_canonical_name: String,
    pub recipient_ein: Option<String>,
    pub amount: f64,
    pub purpose: String,
    pub tax_year: i32,
}

/// One holding on a 990-PF Part II investment schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    pub description: String,
    pub book_value: Option<f64>,
    pub market_value: Option<f64>,
}

/// Governance policy flags reported on the return.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GovernanceIndicator {
    pub conflict_of_interest_policy: Option<bool>,
    pub whistleblower_policy: Option<bool>,
    pub document_retention_policy: Option<bool>,
    pub minutes_documented: Option<bool>,
    pub independent_audit: Option<bool>,
}

/// Top-line financial figures extracted from the return.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub total_revenue: Option<f64>,
    pub total_expenses: Option<f64>,
    pub total_assets: Option<f64>,
    pub net_assets: Option<f64>,
    pub contributions: Option<f64>,
    pub program_expenses: Option<f64>,
    pub admin_expenses: Option<f64>,
    pub fundraising_expenses: Option<f64>,
}

/// Parser quality assessment for one filing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseQuality {
    /// Overall extraction success in [0, 1].
    pub overall: f64,
    /// Fraction of located fields that parsed cleanly.
    pub schema_validation_rate: f64,
    pub officer_completeness: f64,
    pub grant_completeness: f64,
    pub investment_completeness: f64,
    pub financial_completeness: f64,
    pub governance_completeness: f64,
    /// Freshness in [0, 1] derived from the tax year.
    pub data_freshness: f64,
    /// Malformed values recorded during extraction.
    #[serde(default)]
    pub parse_errors: Vec<String>,
}

/// One parsed IRS form submission. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filing {
    pub key: FilingKey,
    pub organization_name: Option<String>,
    pub officers: Vec<Officer>,
    pub grants: Vec<Grant>,
    pub investments: Vec<Investment>,
    pub governance: GovernanceIndicator,
    pub financials: FinancialSummary,
    pub quality: ParseQuality,
}

impl Filing {
    pub fn total_grants(&self) -> f64 {
        self.grants.iter().map(|g| g.amount).sum()
    }

    pub fn officers_with_role(&self, role: RoleCategory) -> impl Iterator<Item = &Officer> {
        self.officers.iter().filter(move |o| o.role == role)
    }
}
