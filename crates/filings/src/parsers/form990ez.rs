//! 990-EZ short-form returns: the compact officer list and summary
//! financials. The EZ carries no grant schedule or investment detail.

use grantscout_core::{Filing, FilingKey, FinancialSummary, GovernanceIndicator};

use super::{amount_optional, extract_officers, OfficerRowSpec};
use crate::dispatch::ParserOptions;
use crate::quality::QualityBuilder;
use crate::xml::XmlNode;

const OFFICERS: OfficerRowSpec = OfficerRowSpec {
    row: "OfficerDirectorTrusteeEmplGrp",
    hours: "AverageHrsPerWkDevotedToPosRt",
    compensation: "CompensationAmt",
};

pub(crate) fn parse(
    root: &XmlNode,
    key: FilingKey,
    organization_name: Option<String>,
    options: &ParserOptions,
) -> Filing {
    let mut quality = QualityBuilder::new();
    let form = root.first("IRS990EZ").unwrap_or(root);

    let officers = extract_officers(form, &OFFICERS, options, &mut quality);
    let financials = extract_financials(form, &mut quality);

    let tax_year = key.tax_year;
    Filing {
        key,
        organization_name,
        officers,
        grants: Vec::new(),
        investments: Vec::new(),
        governance: GovernanceIndicator::default(),
        financials,
        quality: quality.finish(grantscout_core::FormKind::Form990Ez, tax_year),
    }
}

fn extract_financials(form: &XmlNode, quality: &mut QualityBuilder) -> FinancialSummary {
    let summary = FinancialSummary {
        total_revenue: amount_optional(form, "TotalRevenueAmt", quality),
        total_expenses: amount_optional(form, "TotalExpensesAmt", quality),
        total_assets: amount_optional(form, "TotalAssetsEOYAmt", quality),
        net_assets: amount_optional(form, "NetAssetsOrFundBalancesEOYAmt", quality),
        contributions: amount_optional(form, "ContributionsGiftsGrantsEtcAmt", quality),
        program_expenses: None,
        admin_expenses: None,
        fundraising_expenses: None,
    };

    let present = [
        summary.total_revenue,
        summary.total_expenses,
        summary.total_assets,
        summary.net_assets,
        summary.contributions,
    ]
    .iter()
    .filter(|v| v.is_some())
    .count();
    quality.financial_completeness(present, 5);
    summary
}
