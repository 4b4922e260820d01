//! Triage queue: append-only log of borderline opportunities plus a
//! mutable status projection.

use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

use grantscout_core::{TriageDecision, TriageItem, TriageStatus};

#[derive(Clone)]
struct Projection {
    status: TriageStatus,
    decision: Option<TriageDecision>,
    assignee: Option<String>,
}

#[derive(Default)]
pub struct TriageQueue {
    /// Entries in arrival order. Never mutated after append.
    log: RwLock<Vec<TriageItem>>,
    /// (run id, opportunity id) → position in the log + live status.
    projection: DashMap<(String, String), (usize, Projection)>,
}

impl TriageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item. Returns false when the (run, opportunity) pair is
    /// already queued; each enters at most once per workflow run.
    pub fn enqueue(&self, item: TriageItem) -> bool {
        let key = item.dedup_key();
        let mut log = self.log.write();
        let position = log.len();
        let entry = self.projection.entry(key);
        match entry {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert((
                    position,
                    Projection {
                        status: item.status,
                        decision: item.decision.clone(),
                        assignee: item.assignee.clone(),
                    },
                ));
                tracing::debug!(
                    opportunity = %item.opportunity_id,
                    run = %item.run_id,
                    priority = item.priority,
                    "triage item queued"
                );
                log.push(item);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.log.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn update<F>(&self, run_id: &str, opportunity_id: &str, apply: F) -> bool
    where
        F: FnOnce(&mut Projection),
    {
        let key = (run_id.to_string(), opportunity_id.to_string());
        match self.projection.get_mut(&key) {
            Some(mut entry) => {
                apply(&mut entry.value_mut().1);
                true
            }
            None => false,
        }
    }

    pub fn set_status(&self, run_id: &str, opportunity_id: &str, status: TriageStatus) -> bool {
        self.update(run_id, opportunity_id, |p| p.status = status)
    }

    pub fn assign(&self, run_id: &str, opportunity_id: &str, assignee: &str) -> bool {
        self.update(run_id, opportunity_id, |p| {
            p.assignee = Some(assignee.to_string());
            if p.status == TriageStatus::Queued {
                p.status = TriageStatus::InReview;
            }
        })
    }

    pub fn record_decision(
        &self,
        run_id: &str,
        opportunity_id: &str,
        decision: TriageDecision,
    ) -> bool {
        self.update(run_id, opportunity_id, |p| {
            p.decision = Some(decision);
            p.status = TriageStatus::Decided;
        })
    }

    /// Transition Queued items older than `max_age` to Expired. Returns how
    /// many were expired.
    pub fn expire_stale(&self, max_age: std::time::Duration) -> usize {
        let cutoff = Utc::now()
            - ChronoDuration::from_std(max_age).unwrap_or_else(|_| ChronoDuration::days(36500));
        let log = self.log.read();
        let mut expired = 0;
        for item in log.iter() {
            if item.enqueued_at >= cutoff {
                continue;
            }
            if let Some(mut entry) = self.projection.get_mut(&item.dedup_key()) {
                let projection = &mut entry.value_mut().1;
                if projection.status == TriageStatus::Queued {
                    projection.status = TriageStatus::Expired;
                    expired += 1;
                }
            }
        }
        expired
    }

    /// Items for a run with their projected status applied, priority
    /// descending.
    pub fn snapshot(&self, run_id: &str) -> Vec<TriageItem> {
        let log = self.log.read();
        let mut items: Vec<TriageItem> = log
            .iter()
            .filter(|i| i.run_id == run_id)
            .cloned()
            .map(|mut item| {
                if let Some(entry) = self.projection.get(&item.dedup_key()) {
                    let projection = &entry.value().1;
                    item.status = projection.status;
                    item.decision = projection.decision.clone();
                    item.assignee = projection.assignee.clone();
                }
                item
            })
            .collect();
        items.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.opportunity_id.cmp(&b.opportunity_id))
        });
        items
    }
}
