//! Officer role classification and influence scoring.

use serde::{Deserialize, Serialize};

/// Role category derived from title text and return checkboxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleCategory {
    Executive,
    Board,
    Staff,
    Volunteer,
}

impl RoleCategory {
    /// Base contribution to the influence score.
    pub fn base_influence(&self) -> f64 {
        match self {
            RoleCategory::Executive => 1.0,
            RoleCategory::Board => 0.7,
            RoleCategory::Staff => 0.4,
            RoleCategory::Volunteer => 0.2,
        }
    }
}

const EXECUTIVE_MARKERS: &[&str] = &["CEO", "PRESIDENT", "EXECUTIVE DIRECTOR", "CFO", "COO"];
const BOARD_MARKERS: &[&str] = &["DIRECTOR", "CHAIR", "TRUSTEE"];

/// Classify an officer row. First matching rule wins:
/// executive title markers, then officer/director checkboxes or board title
/// markers, then paid staff, else volunteer.
pub fn classify_role(
    title: &str,
    is_officer: bool,
    is_director: bool,
    compensation: f64,
) -> RoleCategory {
    let title_upper = title.to_uppercase();
    if EXECUTIVE_MARKERS.iter().any(|m| title_upper.contains(m)) {
        return RoleCategory::Executive;
    }
    if is_officer || is_director || BOARD_MARKERS.iter().any(|m| title_upper.contains(m)) {
        return RoleCategory::Board;
    }
    if compensation > 0.0 {
        return RoleCategory::Staff;
    }
    RoleCategory::Volunteer
}

/// Influence in [0, 1]:
/// `role_base + comp/500_000 * 0.3 + hours/40 * 0.2 + 0.05 * flags`, clamped.
/// `flag_count` counts the configured voting/policy indicators that are set.
pub fn influence_score(
    role: RoleCategory,
    compensation: f64,
    weekly_hours: f64,
    flag_count: u32,
) -> f64 {
    let comp_term = (compensation / 500_000.0) * 0.3;
    let hours_term = (weekly_hours / 40.0) * 0.2;
    let flag_term = 0.05 * f64::from(flag_count);
    (role.base_influence() + comp_term + hours_term + flag_term).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executive_titles_win_over_checkboxes() {
        assert_eq!(
            classify_role("CEO & Trustee", false, true, 250_000.0),
            RoleCategory::Executive
        );
        assert_eq!(
            classify_role("executive director", false, false, 0.0),
            RoleCategory::Executive
        );
    }

    #[test]
    fn board_from_checkbox_or_title() {
        assert_eq!(classify_role("Member", true, false, 0.0), RoleCategory::Board);
        assert_eq!(classify_role("Board Chair", false, false, 0.0), RoleCategory::Board);
        assert_eq!(classify_role("Trustee", false, false, 5_000.0), RoleCategory::Board);
    }

    #[test]
    fn paid_staff_then_volunteer() {
        assert_eq!(classify_role("Analyst", false, false, 60_000.0), RoleCategory::Staff);
        assert_eq!(classify_role("Helper", false, false, 0.0), RoleCategory::Volunteer);
    }

    #[test]
    fn influence_is_clamped() {
        // An executive already starts at the cap.
        assert_eq!(influence_score(RoleCategory::Executive, 1_000_000.0, 60.0, 2), 1.0);
        let vol = influence_score(RoleCategory::Volunteer, 0.0, 0.0, 0);
        assert!((vol - 0.2).abs() < 1e-9);
    }

    #[test]
    fn influence_terms_add_up() {
        // Board member, 250k comp, 20 hours, one flag:
        // 0.7 + 0.15 + 0.1 + 0.05 = 1.0 exactly at the cap.
        let score = influence_score(RoleCategory::Board, 250_000.0, 20.0, 1);
        assert!((score - 1.0).abs() < 1e-9);

        // Staff, 100k comp, 40 hours, no flags: 0.4 + 0.06 + 0.2 = 0.66.
        let score = influence_score(RoleCategory::Staff, 100_000.0, 40.0, 0);
        assert!((score - 0.66).abs() < 1e-9);
    }
}
