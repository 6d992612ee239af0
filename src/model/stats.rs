//! Aggregate view over task state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::task::Status;

/// Counts by status plus mean processing latency. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Every status is present, zero when no task has it.
    pub by_status: BTreeMap<Status, i64>,
    /// Mean seconds between claim and completion over completed tasks.
    /// `None` until at least one task has completed.
    pub avg_processing: Option<f64>,
    pub total_tasks: i64,
}

/// One grouped row: status, count, mean processing seconds for the group.
pub(crate) type StatusGroup = (Status, i64, Option<f64>);

impl Stats {
    /// Fold grouped per-status rows into a `Stats`.
    pub(crate) fn from_groups(groups: impl IntoIterator<Item = StatusGroup>) -> Self {
        let mut by_status: BTreeMap<Status, i64> =
            Status::ALL.iter().map(|s| (*s, 0)).collect();
        let mut avg_processing = None;

        for (status, count, avg) in groups {
            *by_status.entry(status).or_default() += count;
            if status == Status::Completed {
                avg_processing = avg;
            }
        }

        let total_tasks = by_status.values().sum();
        Self {
            by_status,
            avg_processing,
            total_tasks,
        }
    }

    pub fn count(&self, status: Status) -> i64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_yields_zeroes() {
        let stats = Stats::from_groups([]);
        assert_eq!(stats.total_tasks, 0);
        assert_eq!(stats.by_status.len(), 3);
        assert!(stats.by_status.values().all(|c| *c == 0));
        assert_eq!(stats.avg_processing, None);
    }

    #[test]
    fn groups_fold_into_totals() {
        let stats = Stats::from_groups([
            (Status::Pending, 5, None),
            (Status::Processing, 2, None),
            (Status::Completed, 10, Some(3.5)),
        ]);
        assert_eq!(stats.count(Status::Pending), 5);
        assert_eq!(stats.count(Status::Processing), 2);
        assert_eq!(stats.count(Status::Completed), 10);
        assert_eq!(stats.total_tasks, 17);
        assert_eq!(stats.avg_processing, Some(3.5));
    }

    #[test]
    fn latency_only_taken_from_completed_group() {
        let stats = Stats::from_groups([(Status::Processing, 1, Some(9.0))]);
        assert_eq!(stats.avg_processing, None);
    }
}
