//! The invocation context threaded into every tool execution.
//!
//! There is no process-global state beyond the registry and configuration:
//! cost gating, store access, cancellation, and deadlines all travel here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use uuid::Uuid;

use crate::entities::{Filing, FilingKey, TriageItem};
use crate::error::ToolError;
use crate::fingerprint::Fingerprint;
use crate::tool::ToolResult;

/// Cooperative cancellation signal.
///
/// Cloning shares the underlying flag. Tools check `is_cancelled` before
/// each I/O and at loop boundaries; async waiters use `cancelled().await`.
#[derive(Clone, Default)]
pub struct CancelSignal {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the signal. Idempotent; wakes every waiter.
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolve when the signal trips; resolves immediately if already set.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        let notified = self.inner.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }

    /// Error short-circuit for cooperative checks.
    pub fn check(&self) -> Result<(), ToolError> {
        if self.is_cancelled() {
            Err(ToolError::cancelled())
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelSignal")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Budget gate. Implemented by the cost tracker; billable tools reserve
/// before executing, then commit or refund.
pub trait CostGate: Send + Sync {
    /// Reserve `cost` against every applicable cap. Denial means the caller
    /// short-circuits with `BudgetExceeded`.
    fn reserve(&self, cost: f64) -> Result<(), ToolError>;

    /// Convert a reservation into committed spend.
    fn commit(&self, cost: f64);

    /// Release a reservation after a post-hoc failure.
    fn refund(&self, cost: f64);

    /// Remaining run budget, when the gate carries a run ceiling.
    fn remaining(&self) -> Option<f64>;
}

/// Handle to the intelligence store. Implemented by `grantscout-store`;
/// declared here so tools depend only on the contract.
pub trait IntelligenceStore: Send + Sync {
    fn get_result(&self, fingerprint: &Fingerprint) -> Option<ToolResult>;
    fn put_result(&self, result: ToolResult, ttl: Option<Duration>);

    fn get_filing(&self, key: &FilingKey) -> Option<Arc<Filing>>;
    fn put_filing(&self, filing: Filing) -> Arc<Filing>;
    /// Most recent filing of any kind for an EIN.
    fn latest_filing(&self, ein: &str) -> Option<Arc<Filing>>;
    /// Every cached filing for an EIN, newest first.
    fn filings_for(&self, ein: &str) -> Vec<Arc<Filing>>;
    /// EINs with at least one cached filing.
    fn filing_eins(&self) -> Vec<String>;

    /// Append to the triage queue. Returns false when the (run,
    /// opportunity) pair is already queued; the queue holds each at most
    /// once per run.
    fn enqueue_triage(&self, item: TriageItem) -> bool;
}

/// Everything a tool execution may touch, threaded explicitly.
#[derive(Clone)]
pub struct ToolContext {
    pub cost: Arc<dyn CostGate>,
    pub store: Arc<dyn IntelligenceStore>,
    pub cancel: CancelSignal,
    /// Absolute deadline; tools and sub-pools derive timeouts from it.
    pub deadline: Option<Instant>,
    /// Indexes structured log events for this invocation chain.
    pub correlation_id: Uuid,
    /// Workflow run that owns this invocation, when there is one.
    pub run_id: Option<String>,
}

impl ToolContext {
    pub fn new(cost: Arc<dyn CostGate>, store: Arc<dyn IntelligenceStore>) -> Self {
        Self {
            cost,
            store,
            cancel: CancelSignal::new(),
            deadline: None,
            correlation_id: Uuid::new_v4(),
            run_id: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Time left before the deadline; `None` when no deadline is set.
    pub fn time_remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// A child context whose deadline is the smaller of the current deadline
    /// and `limit` from now. Cancellation is shared with the parent.
    pub fn child_with_timeout(&self, limit: Duration) -> Self {
        let candidate = Instant::now() + limit;
        let deadline = match self.deadline {
            Some(existing) => existing.min(candidate),
            None => candidate,
        };
        let mut child = self.clone();
        child.deadline = Some(deadline);
        child
    }

    /// Cooperative check of cancellation and deadline, in that order.
    pub fn checkpoint(&self) -> Result<(), ToolError> {
        self.cancel.check()?;
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(ToolError::timeout("tool context", 0.0));
            }
        }
        Ok(())
    }
}
