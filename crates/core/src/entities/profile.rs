//! The grant-seeking organization.

use serde::{Deserialize, Serialize};

/// Where an organization operates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeographicScope {
    /// Two-letter postal codes the organization serves.
    pub states: Vec<String>,
    /// When true with an empty state list, there is no state restriction.
    pub nationwide: bool,
}

impl GeographicScope {
    pub fn serves_state(&self, state: &str) -> bool {
        self.nationwide || self.states.iter().any(|s| s.eq_ignore_ascii_case(state))
    }
}

/// A grant-seeking organization. Owned by the external profile store and
/// immutable for the duration of a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub display_name: String,
    pub ein: Option<String>,
    pub mission: String,
    /// NTEE activity codes, most significant first.
    pub ntee_codes: Vec<String>,
    pub geographic_scope: GeographicScope,
    pub focus_areas: Vec<String>,
    pub annual_revenue: Option<f64>,
    pub funding_preferences: Vec<String>,
}

impl Profile {
    /// Primary NTEE code, when the profile declares any.
    pub fn primary_ntee(&self) -> Option<&str> {
        self.ntee_codes.first().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nationwide_scope_serves_everything() {
        let scope = GeographicScope {
            states: vec![],
            nationwide: true,
        };
        assert!(scope.serves_state("VA"));
        assert!(scope.serves_state("ak"));
    }

    #[test]
    fn state_scope_is_case_insensitive() {
        let scope = GeographicScope {
            states: vec!["VA".into(), "MD".into()],
            nationwide: false,
        };
        assert!(scope.serves_state("va"));
        assert!(!scope.serves_state("TX"));
    }
}
