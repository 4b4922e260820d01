//! Cost accounting for billable tools.
//!
//! A process holds one [`CostLedger`] carrying the daily and monthly
//! counters; each workflow run layers a [`RunBudget`] with its own ceiling
//! on top. Counters are atomic micro-units; the only lock is the per-ledger
//! rollover guard taken when a counter's window has elapsed.

mod ledger;

pub use ledger::{BudgetCaps, CostLedger, RunBudget};
