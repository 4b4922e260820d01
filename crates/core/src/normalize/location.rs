//! State extraction from free-form location strings.

/// USPS two-letter codes: the fifty states, DC, and the inhabited
/// territories that appear in IRS data.
const POSTAL_CODES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC", "PR", "VI", "GU", "AS", "MP",
];

/// Extract the state from a location string such as
/// `"1200 Main St, Richmond, VA 23220"`: the last comma-separated token
/// before an optional ZIP, validated against the postal set.
pub fn state_from_location(location: &str) -> Option<String> {
    let last = location.rsplit(',').next()?.trim();
    if last.is_empty() {
        return None;
    }
    // Strip a trailing ZIP or ZIP+4 if present.
    let token = last
        .split_whitespace()
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit() || c == '-'))
        .last()?;
    let candidate = token.to_uppercase();
    POSTAL_CODES
        .contains(&candidate.as_str())
        .then_some(candidate)
}
