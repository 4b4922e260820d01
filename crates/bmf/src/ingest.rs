//! BMF CSV ingest.
//!
//! The export carries a stable header set; rows with an unparseable EIN are
//! dropped with a warning rather than failing the whole ingest, matching
//! how the IRS file actually behaves (a handful of placeholder rows per
//! release).

use std::path::Path;

use serde::Deserialize;

use grantscout_core::normalize::{parse_ein, NteeCode};

use crate::index::BmfIndex;
use crate::record::BmfRecord;
use crate::BmfError;

/// Raw row as exported: all strings, trimmed during conversion.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "EIN")]
    ein: String,
    #[serde(rename = "NAME")]
    name: String,
    #[serde(rename = "CITY", default)]
    city: String,
    #[serde(rename = "STATE", default)]
    state: String,
    #[serde(rename = "NTEE_CD", default)]
    ntee_cd: String,
    #[serde(rename = "REVENUE_AMT", default)]
    revenue_amt: String,
    #[serde(rename = "ASSET_AMT", default)]
    asset_amt: String,
    #[serde(rename = "FOUNDATION", default)]
    foundation: String,
}

const REQUIRED_COLUMNS: [&str; 5] = ["EIN", "NAME", "STATE", "NTEE_CD", "REVENUE_AMT"];

/// Foundation codes 02, 03, and 04 mark private foundations.
fn is_private_foundation(code: &str) -> bool {
    matches!(code.trim(), "02" | "03" | "04")
}

fn parse_money(raw: &str) -> f64 {
    raw.trim().replace(',', "").parse::<f64>().unwrap_or(0.0)
}

pub fn ingest_csv(path: &Path) -> Result<BmfIndex, BmfError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = reader
        .headers()
        .map_err(|e| BmfError::MalformedRow {
            row: 0,
            message: e.to_string(),
        })?
        .clone();
    for required in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == required) {
            return Err(BmfError::MissingColumn(required.to_string()));
        }
    }

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for (row_number, row) in reader.deserialize::<RawRow>().enumerate() {
        let raw = row.map_err(|e| BmfError::MalformedRow {
            row: row_number + 1,
            message: e.to_string(),
        })?;

        let Some(ein) = parse_ein(&raw.ein) else {
            dropped += 1;
            continue;
        };

        records.push(BmfRecord {
            ein: ein.canonical,
            name: raw.name,
            city: raw.city,
            state: raw.state.to_uppercase(),
            ntee: NteeCode::parse(&raw.ntee_cd),
            revenue: parse_money(&raw.revenue_amt),
            assets: parse_money(&raw.asset_amt),
            is_private_foundation: is_private_foundation(&raw.foundation),
        });
    }

    if dropped > 0 {
        tracing::warn!(dropped, "BMF rows dropped for unparseable EINs");
    }
    tracing::info!(rows = records.len(), path = %path.display(), "BMF ingest complete");

    Ok(BmfIndex::build(records))
}
