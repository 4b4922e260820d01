//! Form detection and dispatch.

use grantscout_core::normalize::parse_ein;
use grantscout_core::{Filing, FilingKey, FormKind};

use crate::parsers;
use crate::xml::XmlNode;
use crate::FilingError;

/// Element markers that identify each form kind inside `ReturnData`.
const MARKERS: [(FormKind, &str); 3] = [
    (FormKind::Form990, "IRS990"),
    (FormKind::Form990Pf, "IRS990PF"),
    (FormKind::Form990Ez, "IRS990EZ"),
];

/// Parser configuration.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Officer indicators that contribute influence, by field name.
    pub influence_flags: Vec<String>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            influence_flags: vec!["is_voting_member".to_string(), "is_policy_maker".to_string()],
        }
    }
}

impl ParserOptions {
    /// How many configured influence indicators this officer row sets.
    pub(crate) fn count_flags(&self, is_voting_member: bool, is_policy_maker: bool) -> u32 {
        let mut count = 0;
        for flag in &self.influence_flags {
            let set = match flag.as_str() {
                "is_voting_member" => is_voting_member,
                "is_policy_maker" => is_policy_maker,
                _ => false,
            };
            if set {
                count += 1;
            }
        }
        count
    }
}

fn markers_present(root: &XmlNode) -> Vec<FormKind> {
    MARKERS
        .iter()
        .filter(|(_, marker)| root.first(marker).is_some())
        .map(|(kind, _)| *kind)
        .collect()
}

/// Detect the form kind of a parsed document. Exactly one marker must be
/// present; zero markers is an invalid filing and several is a mismatch.
pub fn detect_form_kind(root: &XmlNode) -> Result<FormKind, FilingError> {
    let present = markers_present(root);
    match present.as_slice() {
        [one] => Ok(*one),
        [] => Err(FilingError::InvalidFiling(
            "document carries no recognizable form marker".to_string(),
        )),
        [first, ..] => Err(FilingError::MismatchedFormKind {
            expected: "a single form marker".to_string(),
            found: *first,
        }),
    }
}

/// Parse a raw filing into a typed [`Filing`].
///
/// When `declared` is given, the document must carry that marker and no
/// foreign one; any foreign marker fails closed with `MismatchedFormKind`.
pub fn parse_filing(
    bytes: &[u8],
    declared: Option<FormKind>,
    options: &ParserOptions,
) -> Result<Filing, FilingError> {
    let root = XmlNode::parse(bytes)?;

    let kind = match declared {
        Some(expected) => {
            let present = markers_present(&root);
            if let Some(foreign) = present.iter().find(|k| **k != expected) {
                return Err(FilingError::MismatchedFormKind {
                    expected: expected.to_string(),
                    found: *foreign,
                });
            }
            if !present.contains(&expected) {
                return Err(FilingError::InvalidFiling(format!(
                    "document carries no {expected} marker"
                )));
            }
            expected
        }
        None => detect_form_kind(&root)?,
    };

    let key = header_key(&root, kind)?;
    let organization_name = root
        .first("Filer")
        .and_then(|f| f.text_of("BusinessNameLine1Txt"))
        .map(|s| s.to_string());

    tracing::debug!(ein = %key.ein, tax_year = key.tax_year, kind = %kind, "parsing filing");

    let filing = match kind {
        FormKind::Form990 => parsers::form990::parse(&root, key, organization_name, options),
        FormKind::Form990Pf => parsers::form990pf::parse(&root, key, organization_name, options),
        FormKind::Form990Ez => parsers::form990ez::parse(&root, key, organization_name, options),
    };
    Ok(filing)
}

/// Root-level requirements: filer EIN and tax year. Either missing fails
/// the whole parse.
fn header_key(root: &XmlNode, kind: FormKind) -> Result<FilingKey, FilingError> {
    let header = root
        .first("ReturnHeader")
        .ok_or_else(|| FilingError::InvalidFiling("missing ReturnHeader".to_string()))?;

    let raw_ein = header
        .first("Filer")
        .and_then(|f| f.text_of("EIN"))
        .ok_or_else(|| FilingError::InvalidFiling("missing filer EIN".to_string()))?;
    let ein = parse_ein(raw_ein)
        .ok_or_else(|| FilingError::InvalidFiling(format!("malformed filer EIN '{raw_ein}'")))?;

    let raw_year = header
        .text_of("TaxYr")
        .or_else(|| header.text_of("TaxYear"))
        .ok_or_else(|| FilingError::InvalidFiling("missing tax year".to_string()))?;
    let tax_year: i32 = raw_year
        .trim()
        .parse()
        .map_err(|_| FilingError::InvalidFiling(format!("malformed tax year '{raw_year}'")))?;

    Ok(FilingKey {
        ein: ein.canonical,
        tax_year,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(marker: &str) -> String {
        format!(
            r#"<Return xmlns="http://www.irs.gov/efile">
              <ReturnHeader>
                <Filer><EIN>300219424</EIN>
                  <BusinessName><BusinessNameLine1Txt>SAMPLE FOUNDATION</BusinessNameLine1Txt></BusinessName>
                </Filer>
                <TaxYr>2023</TaxYr>
              </ReturnHeader>
              <ReturnData>{marker}</ReturnData>
            </Return>"#
        )
    }

    #[test]
    fn detects_each_kind() {
        for (kind, marker) in [
            (FormKind::Form990, "<IRS990/>"),
            (FormKind::Form990Pf, "<IRS990PF/>"),
            (FormKind::Form990Ez, "<IRS990EZ/>"),
        ] {
            let root = XmlNode::parse(doc(marker).as_bytes()).unwrap();
            assert_eq!(detect_form_kind(&root).unwrap(), kind);
        }
    }

    #[test]
    fn foreign_marker_fails_closed() {
        let body = doc("<IRS990PF/><IRS990/>");
        let err = parse_filing(body.as_bytes(), Some(FormKind::Form990Pf), &ParserOptions::default())
            .unwrap_err();
        assert!(matches!(err, FilingError::MismatchedFormKind { .. }));
    }

    #[test]
    fn declared_kind_must_match_marker() {
        let body = doc("<IRS990/>");
        let err = parse_filing(body.as_bytes(), Some(FormKind::Form990Pf), &ParserOptions::default())
            .unwrap_err();
        assert!(matches!(err, FilingError::MismatchedFormKind { found: FormKind::Form990, .. }));
    }

    #[test]
    fn no_marker_is_invalid() {
        let body = doc("");
        let err = parse_filing(body.as_bytes(), None, &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, FilingError::InvalidFiling(_)));
    }

    #[test]
    fn missing_ein_is_invalid() {
        let body = r#"<Return><ReturnHeader><TaxYr>2023</TaxYr></ReturnHeader>
            <ReturnData><IRS990/></ReturnData></Return>"#;
        let err = parse_filing(body.as_bytes(), None, &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, FilingError::InvalidFiling(_)));
    }

    #[test]
    fn header_key_canonicalizes_ein() {
        let body = doc("<IRS990/>");
        let filing = parse_filing(body.as_bytes(), None, &ParserOptions::default()).unwrap();
        assert_eq!(filing.key.ein, "30-0219424");
        assert_eq!(filing.key.tax_year, 2023);
        assert_eq!(filing.organization_name.as_deref(), Some("SAMPLE FOUNDATION"));
    }
}
