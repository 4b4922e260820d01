//! Per-filing extraction quality assessment.

use chrono::{Datelike, Utc};

use grantscout_core::{FormKind, ParseQuality};

/// Accumulates field attempts, parse errors, and per-category completeness
/// while a parser runs, then folds them into a [`ParseQuality`].
#[derive(Debug, Default)]
pub struct QualityBuilder {
    attempted_fields: u32,
    failed_fields: u32,
    errors: Vec<String>,
    officer: Option<f64>,
    grant: Option<f64>,
    investment: Option<f64>,
    financial: Option<f64>,
    governance: Option<f64>,
}

impl QualityBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note one field lookup that parsed cleanly.
    pub fn field_ok(&mut self) {
        self.attempted_fields += 1;
    }

    /// Record a malformed value. The field stays absent.
    pub fn field_error(&mut self, message: String) {
        self.attempted_fields += 1;
        self.failed_fields += 1;
        self.errors.push(message);
    }

    /// Completeness of a record set: rows with all core attributes present
    /// over total rows. An absent section scores zero; sections the form
    /// does not carry are left unset and excluded from the overall mean.
    pub fn officer_completeness(&mut self, complete: usize, total: usize) {
        self.officer = Some(ratio(complete, total));
    }

    pub fn grant_completeness(&mut self, complete: usize, total: usize) {
        self.grant = Some(ratio(complete, total));
    }

    pub fn investment_completeness(&mut self, complete: usize, total: usize) {
        self.investment = Some(ratio(complete, total));
    }

    pub fn financial_completeness(&mut self, present: usize, expected: usize) {
        self.financial = Some(ratio(present, expected));
    }

    pub fn governance_completeness(&mut self, present: usize, expected: usize) {
        self.governance = Some(ratio(present, expected));
    }

    pub fn finish(self, _kind: FormKind, tax_year: i32) -> ParseQuality {
        let schema_validation_rate = if self.attempted_fields == 0 {
            1.0
        } else {
            1.0 - f64::from(self.failed_fields) / f64::from(self.attempted_fields)
        };

        let categories: Vec<f64> = [
            self.officer,
            self.grant,
            self.investment,
            self.financial,
            self.governance,
        ]
        .into_iter()
        .flatten()
        .collect();
        let overall = if categories.is_empty() {
            0.0
        } else {
            (categories.iter().sum::<f64>() / categories.len() as f64) * schema_validation_rate
        };

        ParseQuality {
            overall: overall.clamp(0.0, 1.0),
            schema_validation_rate,
            officer_completeness: self.officer.unwrap_or(1.0),
            grant_completeness: self.grant.unwrap_or(1.0),
            investment_completeness: self.investment.unwrap_or(1.0),
            financial_completeness: self.financial.unwrap_or(1.0),
            governance_completeness: self.governance.unwrap_or(1.0),
            data_freshness: freshness(tax_year),
            parse_errors: self.errors,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Freshness decays once a filing is more than one year behind the current
/// calendar year: the most recent filable year scores 1.0, then -0.2 per
/// additional year.
fn freshness(tax_year: i32) -> f64 {
    let age = Utc::now().year() - tax_year;
    (1.0 - 0.2 * f64::from((age - 1).max(0))).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_rate_counts_failures() {
        let mut q = QualityBuilder::new();
        q.field_ok();
        q.field_ok();
        q.field_ok();
        q.field_error("TotalRevenueAmt: unparseable number 'abc'".into());
        let quality = q.finish(FormKind::Form990, Utc::now().year() - 1);
        assert!((quality.schema_validation_rate - 0.75).abs() < 1e-9);
        assert_eq!(quality.parse_errors.len(), 1);
    }

    #[test]
    fn unset_categories_are_excluded_from_overall() {
        let mut q = QualityBuilder::new();
        q.officer_completeness(1, 2);
        q.financial_completeness(4, 8);
        let quality = q.finish(FormKind::Form990Ez, Utc::now().year() - 1);
        assert!((quality.overall - 0.5).abs() < 1e-9);
        // Investment never applies to a 990-EZ; reported as complete.
        assert!((quality.investment_completeness - 1.0).abs() < 1e-9);
    }

    #[test]
    fn recent_filings_are_fresh() {
        let year = Utc::now().year();
        let fresh = QualityBuilder::new().finish(FormKind::Form990Pf, year - 1);
        assert!((fresh.data_freshness - 1.0).abs() < 1e-9);
        let stale = QualityBuilder::new().finish(FormKind::Form990Pf, year - 4);
        assert!(stale.data_freshness < fresh.data_freshness);
    }
}
