//! Minimal XML tree with local-name lookup.
//!
//! IRS e-file XSDs move fields between minor revisions but keep local
//! names stable, so extraction works on a parsed tree queried by local name
//! at any depth rather than by absolute path. Namespace prefixes are
//! stripped while building the tree.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::FilingError;

/// One element with its text content and children.
#[derive(Debug, Clone, Default)]
pub struct XmlNode {
    pub name: String,
    pub children: Vec<XmlNode>,
    pub text: String,
}

impl XmlNode {
    /// Parse a full document and return its root element.
    pub fn parse(bytes: &[u8]) -> Result<XmlNode, FilingError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| FilingError::InvalidFiling(format!("document is not UTF-8: {e}")))?;
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    stack.push(XmlNode {
                        name: local_name(e.name().as_ref()),
                        ..XmlNode::default()
                    });
                }
                Ok(Event::Empty(e)) => {
                    let node = XmlNode {
                        name: local_name(e.name().as_ref()),
                        ..XmlNode::default()
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None if root.is_none() => root = Some(node),
                        None => {
                            return Err(FilingError::InvalidFiling(
                                "multiple root elements".to_string(),
                            ))
                        }
                    }
                }
                Ok(Event::Text(e)) => {
                    if let Some(current) = stack.last_mut() {
                        let unescaped = e
                            .unescape()
                            .map_err(|err| FilingError::InvalidFiling(err.to_string()))?;
                        if !current.text.is_empty() {
                            current.text.push(' ');
                        }
                        current.text.push_str(unescaped.trim());
                    }
                }
                Ok(Event::End(_)) => {
                    let finished = stack.pop().ok_or_else(|| {
                        FilingError::InvalidFiling("unbalanced closing tag".to_string())
                    })?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(finished),
                        None if root.is_none() => root = Some(finished),
                        None => {
                            return Err(FilingError::InvalidFiling(
                                "multiple root elements".to_string(),
                            ))
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(FilingError::InvalidFiling(format!("malformed XML: {e}"))),
            }
        }

        if !stack.is_empty() {
            return Err(FilingError::InvalidFiling("unterminated element".to_string()));
        }
        root.ok_or_else(|| FilingError::InvalidFiling("empty document".to_string()))
    }

    /// First descendant (including self) with the given local name.
    pub fn first(&self, local: &str) -> Option<&XmlNode> {
        if self.name == local {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.first(local))
    }

    /// Every descendant with the given local name, document order.
    pub fn all<'a>(&'a self, local: &str, out: &mut Vec<&'a XmlNode>) {
        if self.name == local {
            out.push(self);
        }
        for child in &self.children {
            child.all(local, out);
        }
    }

    pub fn collect(&self, local: &str) -> Vec<&XmlNode> {
        let mut out = Vec::new();
        self.all(local, &mut out);
        out
    }

    /// Text of the first descendant with the given local name, when
    /// non-empty.
    pub fn text_of(&self, local: &str) -> Option<&str> {
        self.first(local)
            .map(|n| n.text.as_str())
            .filter(|t| !t.is_empty())
    }

    /// Whether a checkbox-style indicator is set (`X`, `true`, `1`).
    pub fn flag(&self, local: &str) -> bool {
        matches!(
            self.text_of(local).map(|t| t.trim().to_ascii_lowercase()),
            Some(ref t) if t == "x" || t == "true" || t == "1"
        )
    }
}

fn local_name(raw: &[u8]) -> String {
    let name = String::from_utf8_lossy(raw);
    match name.rsplit(':').next() {
        Some(local) => local.to_string(),
        None => name.to_string(),
    }
}

/// Parse a numeric element per the extraction policy: absent element →
/// `Ok(None)`, empty text → zero, malformed text → `Err` with the offending
/// value so the caller can record it in the quality assessment.
pub fn parse_amount(node: &XmlNode, local: &str) -> Result<Option<f64>, String> {
    let Some(field) = node.first(local) else {
        return Ok(None);
    };
    let text = field.text.trim();
    if text.is_empty() {
        return Ok(Some(0.0));
    }
    let cleaned = text.replace(',', "");
    cleaned
        .parse::<f64>()
        .map(Some)
        .map_err(|_| format!("{local}: unparseable number '{text}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0"?>
        <irs:Return xmlns:irs="http://www.irs.gov/efile">
          <irs:ReturnHeader>
            <irs:Filer><irs:EIN>300219424</irs:EIN></irs:Filer>
            <irs:TaxYr>2023</irs:TaxYr>
          </irs:ReturnHeader>
          <irs:ReturnData>
            <irs:IRS990PF>
              <irs:TotalRevAndExpnssAmt>1,204,500</irs:TotalRevAndExpnssAmt>
              <irs:EmptyAmt></irs:EmptyAmt>
              <irs:BadAmt>12x4</irs:BadAmt>
              <irs:ConflictOfInterestPolicyInd>X</irs:ConflictOfInterestPolicyInd>
            </irs:IRS990PF>
          </irs:ReturnData>
        </irs:Return>"#;

    #[test]
    fn strips_namespace_prefixes() {
        let root = XmlNode::parse(DOC.as_bytes()).unwrap();
        assert_eq!(root.name, "Return");
        assert!(root.first("IRS990PF").is_some());
        assert_eq!(root.text_of("EIN"), Some("300219424"));
    }

    #[test]
    fn amount_parsing_policy() {
        let root = XmlNode::parse(DOC.as_bytes()).unwrap();
        assert_eq!(parse_amount(&root, "TotalRevAndExpnssAmt").unwrap(), Some(1_204_500.0));
        assert_eq!(parse_amount(&root, "EmptyAmt").unwrap(), Some(0.0));
        assert_eq!(parse_amount(&root, "MissingAmt").unwrap(), None);
        assert!(parse_amount(&root, "BadAmt").is_err());
    }

    #[test]
    fn checkbox_flags() {
        let root = XmlNode::parse(DOC.as_bytes()).unwrap();
        assert!(root.flag("ConflictOfInterestPolicyInd"));
        assert!(!root.flag("WhistleblowerPolicyInd"));
    }

    #[test]
    fn malformed_xml_is_invalid_filing() {
        let err = XmlNode::parse(b"<Return><Open></Return>").unwrap_err();
        assert!(matches!(err, FilingError::InvalidFiling(_)));
    }

    #[test]
    fn empty_document_is_invalid_filing() {
        assert!(matches!(
            XmlNode::parse(b"").unwrap_err(),
            FilingError::InvalidFiling(_)
        ));
    }
}
