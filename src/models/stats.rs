//! Per-action aggregate statistics.
//!
//! Counters are maintained incrementally: every transition appends signed
//! delta rows, and reads consolidate outstanding deltas into the aggregate
//! row. The `invisible` bucket holds counts for files soft-deleted out of a
//! workflow without a status change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ActionStatus;

/// Document/page/byte counters for one status bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub documents: i64,
    pub pages: i64,
    pub bytes: i64,
}

impl StatusCounts {
    /// Apply a signed delta to this bucket.
    pub fn apply(&mut self, documents: i64, pages: i64, bytes: i64) {
        self.documents += documents;
        self.pages += pages;
        self.bytes += bytes;
    }
}

/// Consolidated statistics for one action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionStats {
    pub pending: StatusCounts,
    pub processing: StatusCounts,
    pub complete: StatusCounts,
    pub failed: StatusCounts,
    pub skipped: StatusCounts,
    /// Counts for files marked invisible in their workflow.
    pub invisible: StatusCounts,
    /// When deltas were last merged in, if ever.
    pub consolidated_at: Option<DateTime<Utc>>,
}

impl ActionStats {
    /// Bucket for a counted status. `None` for `Unattempted`.
    pub fn bucket(&self, status: ActionStatus) -> Option<&StatusCounts> {
        match status {
            ActionStatus::Unattempted => None,
            ActionStatus::Pending => Some(&self.pending),
            ActionStatus::Processing => Some(&self.processing),
            ActionStatus::Complete => Some(&self.complete),
            ActionStatus::Failed => Some(&self.failed),
            ActionStatus::Skipped => Some(&self.skipped),
        }
    }

    /// Mutable bucket for a counted status.
    pub fn bucket_mut(&mut self, status: ActionStatus) -> Option<&mut StatusCounts> {
        match status {
            ActionStatus::Unattempted => None,
            ActionStatus::Pending => Some(&mut self.pending),
            ActionStatus::Processing => Some(&mut self.processing),
            ActionStatus::Complete => Some(&mut self.complete),
            ActionStatus::Failed => Some(&mut self.failed),
            ActionStatus::Skipped => Some(&mut self.skipped),
        }
    }

    /// Total documents across the counted buckets.
    pub fn total_documents(&self) -> i64 {
        ActionStatus::counted()
            .iter()
            .filter_map(|s| self.bucket(*s))
            .map(|b| b.documents)
            .sum()
    }

    /// Total bytes across the counted buckets.
    pub fn total_bytes(&self) -> i64 {
        ActionStatus::counted()
            .iter()
            .filter_map(|s| self.bucket(*s))
            .map(|b| b.bytes)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_delta() {
        let mut counts = StatusCounts::default();
        counts.apply(1, 10, 4096);
        counts.apply(-1, -10, -4096);
        assert_eq!(counts, StatusCounts::default());
    }

    #[test]
    fn test_bucket_lookup() {
        let mut stats = ActionStats::default();
        stats
            .bucket_mut(ActionStatus::Pending)
            .unwrap()
            .apply(3, 30, 300);
        assert_eq!(stats.bucket(ActionStatus::Pending).unwrap().documents, 3);
        assert!(stats.bucket(ActionStatus::Unattempted).is_none());
    }

    #[test]
    fn test_total_documents() {
        let mut stats = ActionStats::default();
        stats.pending.apply(2, 0, 0);
        stats.complete.apply(5, 0, 0);
        stats.failed.apply(1, 0, 0);
        assert_eq!(stats.total_documents(), 8);
    }

    #[test]
    fn test_invisible_not_in_totals() {
        let mut stats = ActionStats::default();
        stats.invisible.apply(4, 0, 100);
        assert_eq!(stats.total_documents(), 0);
        assert_eq!(stats.total_bytes(), 0);
    }
}
