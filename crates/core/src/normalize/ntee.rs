//! National Taxonomy of Exempt Entities codes.

use serde::{Deserialize, Serialize};

/// An NTEE activity code: one major-group letter followed by digits, with an
/// optional specialty suffix (e.g. `B25`, `P20`, `T31Z`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NteeCode(String);

impl NteeCode {
    /// Parse and canonicalize. The letter is folded to upper case; anything
    /// that does not start with an ASCII letter followed by at least one
    /// digit is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().to_uppercase();
        let mut chars = trimmed.chars();
        let first = chars.next()?;
        if !first.is_ascii_alphabetic() {
            return None;
        }
        if !chars.next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            return None;
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(Self(trimmed))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Major group letter, e.g. `B` for education.
    pub fn major_group(&self) -> char {
        self.0.chars().next().unwrap_or('?')
    }

    /// Full code beyond the major group letter.
    pub fn leaf(&self) -> &str {
        &self.0[1..]
    }

    pub fn same_major(&self, other: &NteeCode) -> bool {
        self.major_group() == other.major_group()
    }

    pub fn same_leaf(&self, other: &NteeCode) -> bool {
        self.0 == other.0
    }

    /// Prefix match used by the BMF filter: `P2` matches `P20` and `P25`.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(&prefix.trim().to_uppercase())
    }
}

impl std::fmt::Display for NteeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
