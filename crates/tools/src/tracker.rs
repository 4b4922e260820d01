//! Recent invocation history.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use grantscout_core::{ErrorKind, Fingerprint};

/// One completed invocation, kept for operator queries.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub tool_id: String,
    pub fingerprint: Fingerprint,
    pub duration_ms: u64,
    pub cost: f64,
    pub cached: bool,
    pub success: bool,
    pub error_kind: Option<ErrorKind>,
    pub at: DateTime<Utc>,
}

/// Bounded ring buffer of recent calls.
pub struct ToolCallTracker {
    calls: Mutex<VecDeque<ToolCallRecord>>,
    max_history: usize,
}

impl ToolCallTracker {
    pub fn new(max_history: usize) -> Self {
        Self {
            calls: Mutex::new(VecDeque::with_capacity(max_history)),
            max_history,
        }
    }

    pub fn record(&self, call: ToolCallRecord) {
        let mut calls = self.calls.lock();
        if calls.len() >= self.max_history {
            calls.pop_front();
        }
        calls.push_back(call);
    }

    pub fn recent(&self, n: usize) -> Vec<ToolCallRecord> {
        let calls = self.calls.lock();
        calls.iter().rev().take(n).cloned().collect()
    }

    pub fn by_tool(&self, tool_id: &str) -> Vec<ToolCallRecord> {
        let calls = self.calls.lock();
        calls.iter().filter(|c| c.tool_id == tool_id).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
