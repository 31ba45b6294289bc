//! The per-file, per-action status state machine.
//!
//! A file/action pair is always in exactly one status. A missing
//! `file_action_status` row means `Unattempted` - rows are created lazily on
//! the first transition and never deleted afterwards.

use serde::{Deserialize, Serialize};

/// Status of a file for one pipeline action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Unattempted,
    Pending,
    Processing,
    Complete,
    Failed,
    Skipped,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unattempted => "unattempted",
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unattempted" => Some(Self::Unattempted),
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "complete" => Some(Self::Complete),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// All statuses that occupy a statistics bucket.
    ///
    /// `Unattempted` is the absence of state and is not counted.
    pub fn counted() -> [ActionStatus; 5] {
        [
            Self::Pending,
            Self::Processing,
            Self::Complete,
            Self::Failed,
            Self::Skipped,
        ]
    }

    /// Whether this status occupies a statistics bucket.
    pub fn is_counted(&self) -> bool {
        !matches!(self, Self::Unattempted)
    }

    /// Whether a direct transition from `self` to `to` is a legal edge.
    ///
    /// Recovery reverts and deferred-change replays are validated separately;
    /// this table covers caller-initiated transitions only.
    pub fn can_transition_to(self, to: ActionStatus) -> bool {
        use ActionStatus::*;
        match to {
            // Any status may be explicitly skipped. This also covers the
            // recovery revert Processing -> Skipped.
            Skipped => true,
            // Queued from scratch, re-queued after an outcome, reverted by
            // recovery, or re-queued out of a skip.
            Pending => matches!(self, Unattempted | Processing | Complete | Failed | Skipped),
            // Claimed. Skipped files are claimable subject to the skip
            // ownership rule enforced by the transition engine.
            Processing => matches!(self, Pending | Skipped),
            // Outcomes are only reportable by the worker holding the claim.
            Complete | Failed => matches!(self, Processing),
            // Explicit removal from the queue.
            Unattempted => matches!(self, Pending),
        }
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ActionStatus::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [Unattempted, Pending, Processing, Complete, Failed, Skipped] {
            assert_eq!(ActionStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_status_from_invalid() {
        assert_eq!(ActionStatus::from_str("unknown"), None);
        assert_eq!(ActionStatus::from_str(""), None);
        assert_eq!(ActionStatus::from_str("Pending"), None);
    }

    #[test]
    fn test_counted_excludes_unattempted() {
        assert!(!Unattempted.is_counted());
        for status in ActionStatus::counted() {
            assert!(status.is_counted());
        }
    }

    #[test]
    fn test_claim_edges() {
        assert!(Pending.can_transition_to(Processing));
        assert!(Skipped.can_transition_to(Processing));
        assert!(!Unattempted.can_transition_to(Processing));
        assert!(!Complete.can_transition_to(Processing));
        assert!(!Failed.can_transition_to(Processing));
    }

    #[test]
    fn test_outcomes_require_processing() {
        assert!(Processing.can_transition_to(Complete));
        assert!(Processing.can_transition_to(Failed));
        for from in [Unattempted, Pending, Complete, Failed, Skipped] {
            assert!(!from.can_transition_to(Complete));
            assert!(!from.can_transition_to(Failed));
        }
    }

    #[test]
    fn test_removal_only_from_pending() {
        assert!(Pending.can_transition_to(Unattempted));
        for from in [Unattempted, Processing, Complete, Failed, Skipped] {
            assert!(!from.can_transition_to(Unattempted));
        }
    }

    #[test]
    fn test_any_status_can_be_skipped() {
        for from in [Unattempted, Pending, Processing, Complete, Failed] {
            assert!(from.can_transition_to(Skipped));
        }
    }

    #[test]
    fn test_requeue_after_outcome() {
        assert!(Complete.can_transition_to(Pending));
        assert!(Failed.can_transition_to(Pending));
        assert!(Skipped.can_transition_to(Pending));
    }
}
