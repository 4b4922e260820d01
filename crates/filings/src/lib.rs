//! IRS filing XML parsing
//!
//! Form dispatch plus structured extraction for 990, 990-PF, and 990-EZ
//! returns. Each parser accepts exactly one form kind and fails closed when
//! a document carries a foreign form marker. Extraction is offset-tolerant:
//! fields are located by local name so any IRS XSD minor revision parses.

mod dispatch;
mod parsers;
mod quality;
pub mod xml;

pub use dispatch::{detect_form_kind, parse_filing, ParserOptions};
pub use quality::QualityBuilder;

use grantscout_core::{ErrorKind, FormKind, ToolError};

/// Filing-subsystem failures, translated into the core taxonomy at the
/// tool boundary.
#[derive(Debug, thiserror::Error)]
pub enum FilingError {
    /// Malformed XML or a missing root-level requirement.
    #[error("invalid filing: {0}")]
    InvalidFiling(String),

    /// The document carries a marker for a different form kind.
    #[error("mismatched form kind: expected {expected}, document carries {found} marker")]
    MismatchedFormKind { expected: String, found: FormKind },
}

impl From<FilingError> for ToolError {
    fn from(err: FilingError) -> Self {
        match &err {
            FilingError::InvalidFiling(_) => ToolError::new(ErrorKind::InvalidFiling, err.to_string()),
            FilingError::MismatchedFormKind { .. } => {
                ToolError::new(ErrorKind::MismatchedFormKind, err.to_string())
            }
        }
    }
}
