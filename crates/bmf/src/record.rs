//! One Business Master File organization row.

use serde::{Deserialize, Serialize};

use grantscout_core::normalize::NteeCode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BmfRecord {
    pub ein: String,
    pub name: String,
    pub city: String,
    pub state: String,
    pub ntee: Option<NteeCode>,
    pub revenue: f64,
    pub assets: f64,
    /// IRS foundation code marks private foundations with code 02–04.
    pub is_private_foundation: bool,
}

impl BmfRecord {
    /// Upper-cased name for substring matching.
    pub fn name_upper(&self) -> String {
        self.name.to_uppercase()
    }
}
