//! Per-form parsers plus the extraction helpers they share.

pub(crate) mod form990;
pub(crate) mod form990ez;
pub(crate) mod form990pf;

use grantscout_core::normalize::{
    classify_role, influence_score, normalize_org_name, normalize_person_name, parse_ein,
};
use grantscout_core::{Grant, Officer};

use crate::dispatch::ParserOptions;
use crate::quality::QualityBuilder;
use crate::xml::{parse_amount, XmlNode};

/// Field names for one form's officer rows. Names differ between forms;
/// the extraction logic does not.
pub(crate) struct OfficerRowSpec {
    pub row: &'static str,
    pub hours: &'static str,
    pub compensation: &'static str,
}

/// Extract and normalize every officer row under `scope`.
pub(crate) fn extract_officers(
    scope: &XmlNode,
    spec: &OfficerRowSpec,
    options: &ParserOptions,
    quality: &mut QualityBuilder,
) -> Vec<Officer> {
    let rows = scope.collect(spec.row);
    let mut officers = Vec::with_capacity(rows.len());
    let mut complete = 0;

    for row in &rows {
        let raw_name = match row.text_of("PersonNm") {
            Some(name) => name.to_string(),
            None => continue,
        };
        let title = row.text_of("TitleTxt").unwrap_or("").to_string();
        if !title.is_empty() {
            complete += 1;
        }

        let weekly_hours = amount_or_zero(row, spec.hours, quality);
        let compensation = amount_or_zero(row, spec.compensation, quality);

        let is_director = row.flag("IndividualTrusteeOrDirectorInd");
        let is_officer = row.flag("OfficerInd");
        let is_key_employee = row.flag("KeyEmployeeInd");
        let is_voting_member = is_director;
        let is_policy_maker = is_officer || is_key_employee;

        let role = classify_role(&title, is_officer, is_director, compensation);
        let flag_count = options.count_flags(is_voting_member, is_policy_maker);
        let influence = influence_score(role, compensation, weekly_hours, flag_count);

        officers.push(Officer {
            canonical_name: normalize_person_name(&raw_name),
            raw_name,
            title,
            role,
            compensation,
            weekly_hours,
            is_officer,
            is_director,
            is_voting_member,
            is_policy_maker,
            influence,
        });
    }

    quality.officer_completeness(complete, rows.len());
    officers
}

/// Field names for one form's grant rows.
pub(crate) struct GrantRowSpec {
    pub row: &'static str,
    pub amount: &'static str,
    pub purpose: &'static str,
}

/// Extract grant recipients (990-PF Part XV or 990 Schedule I rows).
pub(crate) fn extract_grants(
    scope: &XmlNode,
    spec: &GrantRowSpec,
    tax_year: i32,
    quality: &mut QualityBuilder,
) -> Vec<Grant> {
    let rows = scope.collect(spec.row);
    let mut grants = Vec::with_capacity(rows.len());
    let mut complete = 0;

    for row in &rows {
        let raw_name = row
            .first("RecipientBusinessName")
            .and_then(|n| n.text_of("BusinessNameLine1Txt"))
            .or_else(|| row.text_of("RecipientPersonNm"));
        let Some(raw_name) = raw_name.map(|s| s.to_string()) else {
            continue;
        };

        let amount = amount_or_zero(row, spec.amount, quality);
        if amount > 0.0 {
            complete += 1;
        }
        let recipient_ein = row
            .text_of("RecipientEIN")
            .and_then(parse_ein)
            .map(|e| e.canonical);

        grants.push(Grant {
            recipient_canonical_name: normalize_org_name(&raw_name),
            recipient_raw_name: raw_name,
            recipient_ein,
            amount,
            purpose: row.text_of(spec.purpose).unwrap_or("").to_string(),
            tax_year,
        });
    }

    quality.grant_completeness(complete, rows.len());
    grants
}

/// A numeric field under `row`; parse failures are logged into the quality
/// assessment and the value treated as absent.
pub(crate) fn amount_or_zero(row: &XmlNode, local: &str, quality: &mut QualityBuilder) -> f64 {
    match parse_amount(row, local) {
        Ok(Some(value)) => {
            quality.field_ok();
            value
        }
        Ok(None) => 0.0,
        Err(message) => {
            quality.field_error(message);
            0.0
        }
    }
}

/// An optional numeric field; `None` when absent or malformed.
pub(crate) fn amount_optional(
    row: &XmlNode,
    local: &str,
    quality: &mut QualityBuilder,
) -> Option<f64> {
    match parse_amount(row, local) {
        Ok(Some(value)) => {
            quality.field_ok();
            Some(value)
        }
        Ok(None) => None,
        Err(message) => {
            quality.field_error(message);
            None
        }
    }
}

/// Governance checkbox: `None` when the element is absent from the return.
pub(crate) fn gov_flag(scope: &XmlNode, local: &str) -> Option<bool> {
    scope.first(local).map(|_| scope.flag(local))
}
