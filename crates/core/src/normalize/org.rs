//! Canonical organization names.

/// Canonicalize an organization name: collapse hyphens to spaces, drop other
/// punctuation, collapse whitespace, fold to upper case. No stemming, no
/// stop-word removal: "THE" and "INC" survive so that distinct legal names
/// stay distinct.
pub fn normalize_org_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for c in raw.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            for u in c.to_uppercase() {
                out.push(u);
            }
        } else if c == '-' || c.is_whitespace() {
            pending_space = true;
        }
        // Remaining punctuation is dropped without inserting a break, so
        // "St. Jude's" becomes "ST JUDES" not "ST JUDE S".
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_hyphens_to_spaces() {
        assert_eq!(normalize_org_name("Smith-Jones Foundation"), "SMITH JONES FOUNDATION");
    }

    #[test]
    fn drops_punctuation_without_breaking_words() {
        assert_eq!(normalize_org_name("St. Jude's Children, Inc."), "ST JUDES CHILDREN INC");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize_org_name("  The   Ford\tFoundation "), "THE FORD FOUNDATION");
    }

    #[test]
    fn no_stop_word_removal() {
        assert_eq!(normalize_org_name("The Trust"), "THE TRUST");
    }
}
