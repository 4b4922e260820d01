//! 990-PF private foundation returns: officers, Part XV grants paid,
//! Part II investment holdings, and the revenue/expense summary.

use grantscout_core::{Filing, FilingKey, FinancialSummary, GovernanceIndicator, Investment};

use super::{
    amount_optional, extract_grants, extract_officers, GrantRowSpec, OfficerRowSpec,
};
use crate::dispatch::ParserOptions;
use crate::quality::QualityBuilder;
use crate::xml::XmlNode;

const OFFICERS: OfficerRowSpec = OfficerRowSpec {
    row: "OfficerDirTrstKeyEmplGrp",
    hours: "AverageHrsPerWkDevotedToPosRt",
    compensation: "CompensationAmt",
};

const GRANTS: GrantRowSpec = GrantRowSpec {
    row: "GrantOrContributionPdDurYrGrp",
    amount: "Amt",
    purpose: "GrantOrContributionPurposeTxt",
};

pub(crate) fn parse(
    root: &XmlNode,
    key: FilingKey,
    organization_name: Option<String>,
    options: &ParserOptions,
) -> Filing {
    let mut quality = QualityBuilder::new();
    // Dispatch guarantees the marker is present.
    let form = root.first("IRS990PF").unwrap_or(root);

    let officers = extract_officers(form, &OFFICERS, options, &mut quality);
    let grants = extract_grants(form, &GRANTS, key.tax_year, &mut quality);
    let investments = extract_investments(form, &mut quality);
    let financials = extract_financials(form, &mut quality);

    let tax_year = key.tax_year;
    Filing {
        key,
        organization_name,
        officers,
        grants,
        investments,
        // 990-PF carries no governance policy section.
        governance: GovernanceIndicator::default(),
        financials,
        quality: quality.finish(grantscout_core::FormKind::Form990Pf, tax_year),
    }
}

/// Part II holdings: description plus book and fair-market valuations.
fn extract_investments(form: &XmlNode, quality: &mut QualityBuilder) -> Vec<Investment> {
    let rows = form.collect("InvestmentsGrp");
    let mut holdings = Vec::with_capacity(rows.len());
    let mut complete = 0;

    for row in &rows {
        let Some(description) = row.text_of("DescriptionTxt").map(|s| s.to_string()) else {
            continue;
        };
        let book_value = amount_optional(row, "BookValueAmt", quality);
        let market_value = amount_optional(row, "FairMarketValueAmt", quality);
        if book_value.is_some() || market_value.is_some() {
            complete += 1;
        }
        holdings.push(Investment {
            description,
            book_value,
            market_value,
        });
    }

    quality.investment_completeness(complete, rows.len());
    holdings
}

fn extract_financials(form: &XmlNode, quality: &mut QualityBuilder) -> FinancialSummary {
    let summary = FinancialSummary {
        total_revenue: amount_optional(form, "TotalRevAndExpnssAmt", quality),
        total_expenses: amount_optional(form, "TotalExpensesRevAndExpnssAmt", quality),
        total_assets: amount_optional(form, "TotalAssetsEOYAmt", quality),
        net_assets: amount_optional(form, "TotNetAstOrFundBalancesEOYAmt", quality),
        contributions: amount_optional(form, "ContriRcvdRevAndExpnssAmt", quality),
        program_expenses: amount_optional(form, "DisbursementsChrtblPrpsAmt", quality),
        admin_expenses: amount_optional(form, "OperatingAndAdmnstrExpnssAmt", quality),
        fundraising_expenses: None,
    };

    let present = [
        summary.total_revenue,
        summary.total_expenses,
        summary.total_assets,
        summary.net_assets,
        summary.contributions,
        summary.program_expenses,
        summary.admin_expenses,
    ]
    .iter()
    .filter(|v| v.is_some())
    .count();
    quality.financial_completeness(present, 7);
    summary
}
