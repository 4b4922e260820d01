//! Full Form 990 returns: Part VII officer compensation table, Schedule I
//! grants, governance checklist, and the statement of revenue and expenses.

use grantscout_core::{Filing, FilingKey, FinancialSummary, GovernanceIndicator};

use super::{amount_optional, extract_grants, extract_officers, gov_flag, GrantRowSpec, OfficerRowSpec};
use crate::dispatch::ParserOptions;
use crate::quality::QualityBuilder;
use crate::xml::XmlNode;

const OFFICERS: OfficerRowSpec = OfficerRowSpec {
    row: "Form990PartVIISectionAGrp",
    hours: "AverageHoursPerWeekRt",
    compensation: "ReportableCompFromOrgAmt",
};

const SCHEDULE_I_GRANTS: GrantRowSpec = GrantRowSpec {
    row: "RecipientTable",
    amount: "CashGrantAmt",
    purpose: "PurposeOfGrantTxt",
};

const GOVERNANCE_FLAGS: [&str; 5] = [
    "ConflictOfInterestPolicyInd",
    "WhistleblowerPolicyInd",
    "DocumentRetentionPolicyInd",
    "MinutesOfGoverningBodyInd",
    "IndependentAuditFinclStmtInd",
];

pub(crate) fn parse(
    root: &XmlNode,
    key: FilingKey,
    organization_name: Option<String>,
    options: &ParserOptions,
) -> Filing {
    let mut quality = QualityBuilder::new();
    let form = root.first("IRS990").unwrap_or(root);

    let officers = extract_officers(form, &OFFICERS, options, &mut quality);

    // Schedule I rides alongside the main form under ReturnData.
    let grants = match root.first("IRS990ScheduleI") {
        Some(schedule) => extract_grants(schedule, &SCHEDULE_I_GRANTS, key.tax_year, &mut quality),
        None => {
            quality.grant_completeness(0, 0);
            Vec::new()
        }
    };

    let governance = extract_governance(form, &mut quality);
    let financials = extract_financials(form, &mut quality);

    let tax_year = key.tax_year;
    Filing {
        key,
        organization_name,
        officers,
        grants,
        investments: Vec::new(),
        governance,
        financials,
        quality: quality.finish(grantscout_core::FormKind::Form990, tax_year),
    }
}

fn extract_governance(form: &XmlNode, quality: &mut QualityBuilder) -> GovernanceIndicator {
    let governance = GovernanceIndicator {
        conflict_of_interest_policy: gov_flag(form, GOVERNANCE_FLAGS[0]),
        whistleblower_policy: gov_flag(form, GOVERNANCE_FLAGS[1]),
        document_retention_policy: gov_flag(form, GOVERNANCE_FLAGS[2]),
        minutes_documented: gov_flag(form, GOVERNANCE_FLAGS[3]),
        independent_audit: gov_flag(form, GOVERNANCE_FLAGS[4]),
    };
    let present = GOVERNANCE_FLAGS
        .iter()
        .filter(|f| form.first(f).is_some())
        .count();
    quality.governance_completeness(present, GOVERNANCE_FLAGS.len());
    governance
}

fn extract_financials(form: &XmlNode, quality: &mut QualityBuilder) -> FinancialSummary {
    let summary = FinancialSummary {
        total_revenue: amount_optional(form, "CYTotalRevenueAmt", quality),
        total_expenses: amount_optional(form, "CYTotalExpensesAmt", quality),
        total_assets: amount_optional(form, "TotalAssetsEOYAmt", quality),
        net_assets: amount_optional(form, "NetAssetsOrFundBalancesEOYAmt", quality),
        contributions: amount_optional(form, "CYContributionsGrantsAmt", quality),
        program_expenses: amount_optional(form, "TotalProgramServiceExpensesAmt", quality),
        admin_expenses: amount_optional(form, "ManagementAndGeneralExpensesAmt", quality),
        fundraising_expenses: amount_optional(form, "FundraisingExpensesAmt", quality),
    };

    let present = [
        summary.total_revenue,
        summary.total_expenses,
        summary.total_assets,
        summary.net_assets,
        summary.contributions,
        summary.program_expenses,
        summary.admin_expenses,
        summary.fundraising_expenses,
    ]
    .iter()
    .filter(|v| v.is_some())
    .count();
    quality.financial_completeness(present, 8);
    summary
}
