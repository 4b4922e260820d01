//! Business Master File filter engine
//!
//! Ingests the IRS BMF CSV once, builds covering indexes, and evaluates
//! multi-predicate filters by applying the most selective indexed predicate
//! first. The index is read-mostly: a shared handle guards it with a
//! reader-writer lock so a background refresh can swap in a new snapshot
//! without blocking readers for the duration of the ingest.

mod filter;
mod index;
mod ingest;
mod record;

pub use filter::{DrivingIndex, FilterCriteria, FilterOutcome, FilterPerformance, OrgRow};
pub use index::BmfIndex;
pub use ingest::ingest_csv;
pub use record::BmfRecord;

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use grantscout_core::{ErrorKind, ToolError};

/// BMF subsystem failures.
#[derive(Debug, thiserror::Error)]
pub enum BmfError {
    #[error("failed to read BMF file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read BMF CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed BMF row {row}: {message}")]
    MalformedRow { row: usize, message: String },

    #[error("BMF header missing column '{0}'")]
    MissingColumn(String),
}

impl From<BmfError> for ToolError {
    fn from(err: BmfError) -> Self {
        ToolError::new(ErrorKind::InvalidArguments, err.to_string())
    }
}

/// Read-mostly shared index with background refresh.
#[derive(Clone)]
pub struct SharedBmfIndex {
    inner: Arc<RwLock<Arc<BmfIndex>>>,
}

impl SharedBmfIndex {
    pub fn new(index: BmfIndex) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    pub fn load(path: &Path) -> Result<Self, BmfError> {
        Ok(Self::new(ingest_csv(path)?))
    }

    /// Current snapshot; the Arc keeps it alive across a concurrent refresh.
    pub fn snapshot(&self) -> Arc<BmfIndex> {
        self.inner.read().clone()
    }

    /// Re-ingest and swap. Readers keep their old snapshot until they next
    /// call [`snapshot`](Self::snapshot).
    pub fn refresh(&self, path: &Path) -> Result<(), BmfError> {
        let fresh = Arc::new(ingest_csv(path)?);
        tracing::info!(rows = fresh.len(), "BMF index refreshed");
        *self.inner.write() = fresh;
        Ok(())
    }
}
