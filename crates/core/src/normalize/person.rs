//! Canonical person names for cross-form network analysis.

use unicode_segmentation::UnicodeSegmentation;

/// Honorifics stripped from the front of a name.
const TITLES: &[&str] = &["DR", "MR", "MRS", "MS", "PROF", "REV"];

/// Generational and professional suffixes stripped from the tail.
const SUFFIXES: &[&str] = &["JR", "SR", "II", "III", "IV", "ESQ"];

/// Canonicalize a person name: strip titles and suffixes, drop punctuation,
/// collapse whitespace, fold to upper case.
///
/// The output is deterministic for equal normalized byte strings, which is
/// what lets officers be matched across filings from different years and
/// form kinds.
pub fn normalize_person_name(raw: &str) -> String {
    let tokens: Vec<String> = raw
        .unicode_words()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_uppercase()
        })
        .filter(|t| !t.is_empty())
        .collect();

    let mut start = 0;
    while start < tokens.len() && TITLES.contains(&tokens[start].as_str()) {
        start += 1;
    }
    let mut end = tokens.len();
    while end > start && SUFFIXES.contains(&tokens[end - 1].as_str()) {
        end -= 1;
    }

    tokens[start..end].join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_titles_and_suffixes() {
        assert_eq!(normalize_person_name("Dr. John A. Smith Jr."), "JOHN A SMITH");
        assert_eq!(normalize_person_name("Rev. Mary   Jones, III"), "MARY JONES");
        assert_eq!(normalize_person_name("Prof Alan Turing Esq"), "ALAN TURING");
    }

    #[test]
    fn keeps_interior_tokens_that_look_like_suffixes() {
        // "Sr" in the middle of a name is not a suffix position.
        assert_eq!(normalize_person_name("Maria Sr Lopez"), "MARIA SR LOPEZ");
    }

    #[test]
    fn removes_punctuation_and_collapses_whitespace() {
        assert_eq!(normalize_person_name("  o'brien,   Patrick "), "OBRIEN PATRICK");
        assert_eq!(normalize_person_name("SMITH-JONES, ANNE"), "SMITH JONES ANNE");
    }

    #[test]
    fn deterministic_for_equal_inputs() {
        let a = normalize_person_name("Ms. Jane Q. Public");
        let b = normalize_person_name("Ms. Jane Q. Public");
        assert_eq!(a, b);
        assert_eq!(a, "JANE Q PUBLIC");
    }

    #[test]
    fn empty_and_title_only_names() {
        assert_eq!(normalize_person_name(""), "");
        assert_eq!(normalize_person_name("Dr."), "");
    }
}
