//! Employer Identification Number parsing and validity.

use serde::{Deserialize, Serialize};

/// Campus prefixes the IRS has never assigned. An EIN with one of these
/// prefixes is structurally well-formed but cannot identify a real filer.
const INVALID_PREFIXES: &[&str] = &[
    "00", "07", "08", "09", "17", "18", "19", "28", "29", "49", "69", "70", "78", "79", "89",
    "96", "97",
];

/// A parsed EIN in canonical `XX-XXXXXXX` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ein {
    pub canonical: String,
    /// False when the prefix is on the IRS unassigned list.
    pub valid: bool,
}

impl Ein {
    pub fn prefix(&self) -> &str {
        &self.canonical[..2]
    }
}

impl std::fmt::Display for Ein {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Parse an EIN from `XX-XXXXXXX` or nine consecutive digits. Returns `None`
/// when the shape is wrong; validity of the prefix is reported separately so
/// callers can keep structurally-parseable records while flagging them.
pub fn parse_ein(raw: &str) -> Option<Ein> {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 9 {
        return None;
    }
    // Only a bare 9-digit run or the dashed form are accepted; anything with
    // other interleaved characters is rejected.
    let dashed_ok = trimmed.len() == 10
        && trimmed.as_bytes()[2] == b'-'
        && trimmed[..2].bytes().all(|b| b.is_ascii_digit())
        && trimmed[3..].bytes().all(|b| b.is_ascii_digit());
    let bare_ok = trimmed.len() == 9 && trimmed.bytes().all(|b| b.is_ascii_digit());
    if !dashed_ok && !bare_ok {
        return None;
    }

    let canonical = format!("{}-{}", &digits[..2], &digits[2..]);
    let valid = !INVALID_PREFIXES.contains(&&digits[..2]);
    Some(Ein { canonical, valid })
}
