//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM with compile-time query checking
//! against SQLite. Every externally visible operation is a single
//! transaction; cross-worker invariants are enforced entirely by table state.

pub mod context;
pub mod pool;
pub mod queue;
pub mod records;
pub mod retry;
pub mod sessions;
pub mod stats;
pub mod transition;

pub use context::{DbContext, Tuning};
pub use pool::{AsyncSqlitePool, DieselError, SqliteConn};
pub use queue::{ClaimOptions, EnqueueRequest, QueueRepository};
pub use sessions::{SessionRepository, SweepReport};
pub use stats::StatsRepository;
pub use transition::{TransitionOptions, TransitionOutcome};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::ActionStatus;

/// Errors surfaced by queue operations.
///
/// Transient store failures are retried inside the repositories and reach the
/// caller as `Store` only after retry exhaustion. An ownership conflict is
/// not an error: the request is deferred and the call reports
/// [`TransitionOutcome::Deferred`].
#[derive(Debug, Error)]
pub enum QueueError {
    /// A referenced file, action, or worker session does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The requested status is not reachable from the current status.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: ActionStatus,
        to: ActionStatus,
    },

    /// A skipped file may not be reclaimed by the user who skipped it.
    #[error("file was skipped by {owner} and may not be reclaimed by the same user")]
    SkipOwned { owner: String },

    /// A claim requires a registered worker session.
    #[error("operation requires a registered worker session")]
    NoWorkerSession,

    /// Store failure, surfaced after retry exhaustion.
    #[error("database error: {0}")]
    Store(#[from] DieselError),
}

/// Repository result type.
pub type Result<T> = std::result::Result<T, QueueError>;

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_roundtrip() {
        let now = Utc::now();
        let parsed = parse_datetime(&now.to_rfc3339());
        assert_eq!(parsed.timestamp(), now.timestamp());
    }

    #[test]
    fn test_parse_datetime_garbage_is_epoch() {
        assert_eq!(parse_datetime("not a date"), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_parse_datetime_opt() {
        assert_eq!(parse_datetime_opt(None), None);
        assert_eq!(parse_datetime_opt(Some("garbage".to_string())), None);
        let now = Utc::now();
        assert!(parse_datetime_opt(Some(now.to_rfc3339())).is_some());
    }
}
