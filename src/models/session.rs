//! Worker session models.
//!
//! Each running worker process registers one session row and refreshes its
//! heartbeat from a background task. A session whose heartbeat goes stale is
//! presumed dead and its claims are reverted by the lease sweep.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSession {
    /// Database row ID; also the lock-ownership key.
    pub id: i32,
    /// Random identity assigned at registration.
    pub session_uuid: String,
    /// User the worker runs as.
    pub user: String,
    /// Hostname of the worker machine.
    pub machine: String,
    /// Process ID on the worker machine.
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

impl WorkerSession {
    /// Check if the session is stale (no heartbeat for the given duration).
    pub fn is_stale(&self, threshold_secs: i64) -> bool {
        let age = Utc::now() - self.last_heartbeat;
        age.num_seconds() > threshold_secs
    }

    /// Seconds since the last heartbeat.
    pub fn heartbeat_age_secs(&self) -> i64 {
        (Utc::now() - self.last_heartbeat).num_seconds()
    }
}

/// Identity attached to every queue operation.
///
/// The user and machine go into the audit trail; the worker id, when present,
/// is the lock-ownership key for claims and outcome reports.
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub user: String,
    pub machine: String,
    /// Registered session id, when the caller is a worker.
    pub worker_id: Option<i32>,
}

impl ActorContext {
    /// Build a context from the process environment.
    pub fn from_env() -> Self {
        Self {
            user: current_user(),
            machine: current_hostname(),
            worker_id: None,
        }
    }

    /// Copy of this context bound to a registered worker session.
    pub fn with_worker(&self, worker_id: i32) -> Self {
        Self {
            user: self.user.clone(),
            machine: self.machine.clone(),
            worker_id: Some(worker_id),
        }
    }
}

/// Get the current OS user name.
fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Get the current hostname.
fn current_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> WorkerSession {
        WorkerSession {
            id: 1,
            session_uuid: "00000000-0000-0000-0000-000000000000".to_string(),
            user: "tester".to_string(),
            machine: "testhost".to_string(),
            pid: 4242,
            started_at: Utc::now(),
            last_heartbeat: Utc::now(),
        }
    }

    #[test]
    fn test_fresh_session_not_stale() {
        assert!(!session().is_stale(60));
    }

    #[test]
    fn test_stale_after_threshold() {
        let mut s = session();
        s.last_heartbeat = Utc::now() - chrono::Duration::seconds(120);
        assert!(s.is_stale(60));
        assert!(!s.is_stale(180));
    }

    #[test]
    fn test_actor_with_worker() {
        let actor = ActorContext {
            user: "a".to_string(),
            machine: "m".to_string(),
            worker_id: None,
        };
        let bound = actor.with_worker(7);
        assert_eq!(bound.worker_id, Some(7));
        assert_eq!(bound.user, "a");
    }
}
