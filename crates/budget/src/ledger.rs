//! Atomic cost counters with UTC-midnight rollover.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Datelike, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use grantscout_core::{CostGate, ToolError};

/// Costs are tracked in millionths of an account unit so the counters can
/// stay lock-free integers.
const MICROS: f64 = 1_000_000.0;

fn to_micros(cost: f64) -> u64 {
    (cost.max(0.0) * MICROS).round() as u64
}

fn from_micros(micros: u64) -> f64 {
    micros as f64 / MICROS
}

/// Caps applied by the shared ledger. `None` means uncapped.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BudgetCaps {
    pub daily: Option<f64>,
    pub monthly: Option<f64>,
}

/// One rolling counter: spend within the current window.
struct WindowCounter {
    used: AtomicU64,
    /// Window identity: ordinal day or (year * 12 + month).
    window: Mutex<i64>,
}

impl WindowCounter {
    fn new(window: i64) -> Self {
        Self {
            used: AtomicU64::new(0),
            window: Mutex::new(window),
        }
    }

    /// Reset the counter when the wall clock has moved into a new window.
    fn roll(&self, current: i64) {
        let mut window = self.window.lock();
        if *window != current {
            *window = current;
            self.used.store(0, Ordering::SeqCst);
        }
    }

    /// Reserve `amount` if it fits under `cap`. CAS loop keeps the counter
    /// lock-free on the hot path.
    fn try_add(&self, amount: u64, cap: Option<u64>) -> bool {
        let Some(cap) = cap else {
            self.used.fetch_add(amount, Ordering::SeqCst);
            return true;
        };
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                let next = used.saturating_add(amount);
                (next <= cap).then_some(next)
            })
            .is_ok()
    }

    fn sub(&self, amount: u64) {
        let mut current = self.used.load(Ordering::SeqCst);
        loop {
            let next = current.saturating_sub(amount);
            match self.used.compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    fn used(&self) -> u64 {
        self.used.load(Ordering::SeqCst)
    }
}

fn current_day() -> i64 {
    i64::from(Utc::now().num_days_from_ce())
}

fn current_month() -> i64 {
    let now = Utc::now();
    i64::from(now.year()) * 12 + i64::from(now.month0())
}

/// Process-wide spend ledger. Daily and monthly windows roll over at
/// wall-clock midnight UTC.
pub struct CostLedger {
    caps: BudgetCaps,
    day: WindowCounter,
    month: WindowCounter,
}

impl CostLedger {
    pub fn new(caps: BudgetCaps) -> Self {
        Self {
            caps,
            day: WindowCounter::new(current_day()),
            month: WindowCounter::new(current_month()),
        }
    }

    fn reserve_micros(&self, amount: u64) -> bool {
        self.day.roll(current_day());
        self.month.roll(current_month());

        if !self.day.try_add(amount, self.caps.daily.map(to_micros)) {
            return false;
        }
        if !self.month.try_add(amount, self.caps.monthly.map(to_micros)) {
            // Back out the daily reservation so the two windows agree.
            self.day.sub(amount);
            return false;
        }
        true
    }

    fn refund_micros(&self, amount: u64) {
        self.day.sub(amount);
        self.month.sub(amount);
    }

    pub fn daily_spend(&self) -> f64 {
        self.day.roll(current_day());
        from_micros(self.day.used())
    }

    pub fn monthly_spend(&self) -> f64 {
        self.month.roll(current_month());
        from_micros(self.month.used())
    }
}

/// Per-run budget layered over the shared ledger. This is the [`CostGate`]
/// handed to tool contexts.
pub struct RunBudget {
    ledger: Arc<CostLedger>,
    ceiling: Option<u64>,
    reserved: AtomicU64,
    committed: AtomicU64,
}

impl RunBudget {
    pub fn new(ledger: Arc<CostLedger>, run_ceiling: Option<f64>) -> Self {
        Self {
            ledger,
            ceiling: run_ceiling.map(to_micros),
            reserved: AtomicU64::new(0),
            committed: AtomicU64::new(0),
        }
    }

    /// An uncapped budget over a fresh ledger, for tests and ad-hoc calls.
    pub fn unlimited() -> Self {
        Self::new(Arc::new(CostLedger::new(BudgetCaps::default())), None)
    }

    /// Total committed spend for this run.
    pub fn committed(&self) -> f64 {
        from_micros(self.committed.load(Ordering::SeqCst))
    }

    /// Spend reserved (committed or in flight) for this run.
    pub fn reserved(&self) -> f64 {
        from_micros(self.reserved.load(Ordering::SeqCst))
    }

    /// Whether a planned cost could currently be reserved, without
    /// reserving it. The workflow engine uses this to skip steps whose
    /// planned cost cannot fit.
    pub fn would_fit(&self, cost: f64) -> bool {
        let amount = to_micros(cost);
        match self.ceiling {
            Some(cap) => self.reserved.load(Ordering::SeqCst).saturating_add(amount) <= cap,
            None => true,
        }
    }
}

impl CostGate for RunBudget {
    fn reserve(&self, cost: f64) -> Result<(), ToolError> {
        let amount = to_micros(cost);
        if amount == 0 {
            return Ok(());
        }

        if let Some(cap) = self.ceiling {
            let fits = self
                .reserved
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                    let next = used.saturating_add(amount);
                    (next <= cap).then_some(next)
                })
                .is_ok();
            if !fits {
                return Err(ToolError::budget_exceeded(format!(
                    "run budget exhausted: reserving {:.6} would exceed ceiling {:.6}",
                    cost,
                    from_micros(cap)
                )));
            }
        } else {
            self.reserved.fetch_add(amount, Ordering::SeqCst);
        }

        if !self.ledger.reserve_micros(amount) {
            self.reserved.fetch_sub(amount, Ordering::SeqCst);
            return Err(ToolError::budget_exceeded(
                "daily or monthly budget cap exhausted",
            ));
        }
        Ok(())
    }

    fn commit(&self, cost: f64) {
        // The reservation already counts toward every cap; committing only
        // moves it into the committed statistic.
        self.committed.fetch_add(to_micros(cost), Ordering::SeqCst);
    }

    fn refund(&self, cost: f64) {
        let amount = to_micros(cost);
        if amount == 0 {
            return;
        }
        let mut current = self.reserved.load(Ordering::SeqCst);
        loop {
            let next = current.saturating_sub(amount);
            match self.reserved.compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
        self.ledger.refund_micros(amount);
    }

    fn remaining(&self) -> Option<f64> {
        self.ceiling.map(|cap| {
            from_micros(cap.saturating_sub(self.reserved.load(Ordering::SeqCst)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_budget(ceiling: f64) -> RunBudget {
        RunBudget::new(Arc::new(CostLedger::new(BudgetCaps::default())), Some(ceiling))
    }

    #[test]
    fn reserve_commit_refund_cycle() {
        let budget = run_budget(0.10);
        budget.reserve(0.04).unwrap();
        budget.commit(0.04);
        budget.reserve(0.04).unwrap();
        budget.refund(0.04);

        assert!((budget.committed() - 0.04).abs() < 1e-9);
        assert!((budget.reserved() - 0.04).abs() < 1e-9);
        assert!((budget.remaining().unwrap() - 0.06).abs() < 1e-9);
    }

    #[test]
    fn reservation_beyond_ceiling_is_denied() {
        let budget = run_budget(0.10);
        budget.reserve(0.08).unwrap();
        let err = budget.reserve(0.03).unwrap_err();
        assert_eq!(err.kind(), grantscout_core::ErrorKind::BudgetExceeded);
        // The failed reservation must not leak into the counters.
        assert!((budget.reserved() - 0.08).abs() < 1e-9);
    }

    #[test]
    fn committed_never_exceeds_ceiling() {
        let budget = run_budget(0.10);
        let mut committed = 0.0;
        for _ in 0..300 {
            if budget.reserve(0.0005).is_ok() {
                budget.commit(0.0005);
                committed += 0.0005;
            }
        }
        assert!(committed <= 0.10 + 1e-9);
        assert!(budget.committed() <= 0.10 + 1e-9);
    }

    #[test]
    fn daily_cap_denies_across_runs() {
        let ledger = Arc::new(CostLedger::new(BudgetCaps {
            daily: Some(0.01),
            monthly: None,
        }));
        let first = RunBudget::new(ledger.clone(), None);
        let second = RunBudget::new(ledger.clone(), None);

        first.reserve(0.008).unwrap();
        assert!(second.reserve(0.008).is_err());
        assert!(second.reserve(0.002).is_ok());
        assert!((ledger.daily_spend() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn refund_releases_ledger_spend() {
        let ledger = Arc::new(CostLedger::new(BudgetCaps {
            daily: Some(0.01),
            monthly: Some(0.01),
        }));
        let budget = RunBudget::new(ledger.clone(), None);
        budget.reserve(0.01).unwrap();
        budget.refund(0.01);
        assert!(budget.reserve(0.01).is_ok());
    }

    #[test]
    fn zero_cost_is_always_allowed() {
        let budget = run_budget(0.0);
        assert!(budget.reserve(0.0).is_ok());
    }

    #[test]
    fn would_fit_does_not_reserve() {
        let budget = run_budget(0.10);
        assert!(budget.would_fit(0.10));
        assert!(!budget.would_fit(0.11));
        assert!((budget.reserved() - 0.0).abs() < 1e-9);
    }
}
