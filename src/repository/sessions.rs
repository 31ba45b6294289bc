//! Worker session registry and lease recovery.
//!
//! Each worker registers once per run and refreshes its heartbeat from a
//! background task. A session whose heartbeat goes stale is presumed dead;
//! the sweep reverts every lock it held to the lock's recorded fallback
//! status and removes the session. The sweep is throttled so hot claim loops
//! do not rescan the lease table on every call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};
use uuid::Uuid;

use crate::models::{ActionStatus, ActorContext, WorkerSession};
use crate::schema::{locked_files, worker_sessions};

use super::records::{LockedFileRecord, NewWorkerSession, WorkerSessionRecord};
use super::retry::with_retry;
use super::transition::{self, TransitionKind, TransitionOptions, TransitionOutcome, TransitionRequest};
use super::{parse_datetime, AsyncSqlitePool, QueueError, Result, SqliteConn};

/// User recorded on audit rows written by the recovery engine.
const RECOVERY_USER: &str = "queue-recovery";

/// Result of a lease sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepReport {
    /// Whether the sweep actually ran (false when throttled).
    pub swept: bool,
    /// Expired sessions removed.
    pub expired_sessions: usize,
    /// Locks reverted to their fallback status.
    pub reverted_locks: usize,
    /// Corrupt lock rows repaired (lock without a live session, or a lock on
    /// a pair that was not Processing).
    pub repaired_locks: usize,
}

/// Process-local rate limit for the lease sweep.
pub(crate) struct SweepThrottle {
    min_interval: Duration,
    last: tokio::sync::Mutex<Option<Instant>>,
}

impl SweepThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: tokio::sync::Mutex::new(None),
        }
    }

    /// Claim the right to sweep. Returns false while inside the interval.
    async fn acquire(&self, force: bool) -> bool {
        let mut last = self.last.lock().await;
        if !force {
            if let Some(at) = *last {
                if at.elapsed() < self.min_interval {
                    return false;
                }
            }
        }
        *last = Some(Instant::now());
        true
    }
}

/// Repository for worker sessions and lease recovery.
#[derive(Clone)]
pub struct SessionRepository {
    pool: AsyncSqlitePool,
    throttle: Arc<SweepThrottle>,
    session_timeout_secs: i64,
    retry_attempts: u32,
}

impl SessionRepository {
    pub(crate) fn new(
        pool: AsyncSqlitePool,
        throttle: Arc<SweepThrottle>,
        session_timeout_secs: i64,
        retry_attempts: u32,
    ) -> Self {
        Self {
            pool,
            throttle,
            session_timeout_secs,
            retry_attempts,
        }
    }

    /// Register the calling process as a worker.
    pub async fn register_worker(&self, actor: &ActorContext) -> Result<WorkerSession> {
        let user = actor.user.clone();
        let machine = actor.machine.clone();
        with_retry(self.retry_attempts, "register worker", || {
            self.register_worker_inner(user.clone(), machine.clone())
        })
        .await
    }

    async fn register_worker_inner(&self, user: String, machine: String) -> Result<WorkerSession> {
        let mut conn = self.pool.get().await?;
        let session_uuid = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        diesel::insert_into(worker_sessions::table)
            .values(&NewWorkerSession {
                session_uuid: &session_uuid,
                user: &user,
                machine: &machine,
                pid: std::process::id() as i32,
                started_at: &now,
                last_heartbeat: &now,
            })
            .execute(&mut conn)
            .await?;

        let record: WorkerSessionRecord = worker_sessions::table
            .filter(worker_sessions::session_uuid.eq(&session_uuid))
            .first(&mut conn)
            .await?;

        tracing::info!("registered worker session {} (id {})", session_uuid, record.id);
        Ok(session_from_record(&record))
    }

    /// Refresh the caller's heartbeat.
    pub async fn heartbeat(&self, worker_id: i32) -> Result<()> {
        with_retry(self.retry_attempts, "heartbeat", || self.heartbeat_inner(worker_id)).await
    }

    async fn heartbeat_inner(&self, worker_id: i32) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now().to_rfc3339();
        let updated = diesel::update(worker_sessions::table.find(worker_id))
            .set(worker_sessions::last_heartbeat.eq(&now))
            .execute(&mut conn)
            .await?;
        if updated == 0 {
            return Err(QueueError::NotFound(format!("worker session {worker_id}")));
        }
        Ok(())
    }

    /// List all registered sessions.
    pub async fn list_sessions(&self) -> Result<Vec<WorkerSession>> {
        let mut conn = self.pool.get().await?;
        let records: Vec<WorkerSessionRecord> = worker_sessions::table
            .order(worker_sessions::started_at.asc())
            .load(&mut conn)
            .await?;
        Ok(records.iter().map(session_from_record).collect())
    }

    /// Graceful shutdown: revert every lock the session holds, then remove it.
    pub async fn deregister_worker(&self, worker_id: i32) -> Result<usize> {
        with_retry(self.retry_attempts, "deregister worker", || {
            self.deregister_worker_inner(worker_id)
        })
        .await
    }

    async fn deregister_worker_inner(&self, worker_id: i32) -> Result<usize> {
        let mut conn = self.pool.get().await?;
        conn.transaction::<usize, QueueError, _>(|conn| {
            Box::pin(async move {
                let session: WorkerSessionRecord = worker_sessions::table
                    .find(worker_id)
                    .first(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| QueueError::NotFound(format!("worker session {worker_id}")))?;

                let comment = format!(
                    "reverted on deregistration of worker session {}",
                    session.session_uuid
                );
                let (reverted, _) = revert_session_locks(conn, worker_id, &comment).await?;

                diesel::delete(worker_sessions::table.find(worker_id))
                    .execute(conn)
                    .await?;

                tracing::info!(
                    "deregistered worker session {} ({} locks reverted)",
                    session.session_uuid,
                    reverted
                );
                Ok(reverted)
            })
        })
        .await
    }

    /// Revert claims held by sessions whose heartbeat expired.
    ///
    /// Throttled: returns a report with `swept == false` when called inside
    /// the minimum sweep interval, unless `force` is set.
    pub async fn sweep_expired(&self, force: bool) -> Result<SweepReport> {
        self.sweep_expired_older_than(self.session_timeout_secs, force)
            .await
    }

    /// Sweep with an explicit heartbeat age limit.
    pub async fn sweep_expired_older_than(
        &self,
        max_age_secs: i64,
        force: bool,
    ) -> Result<SweepReport> {
        if !self.throttle.acquire(force).await {
            return Ok(SweepReport::default());
        }
        with_retry(self.retry_attempts, "lease sweep", || {
            self.sweep_inner(max_age_secs)
        })
        .await
    }

    async fn sweep_inner(&self, max_age_secs: i64) -> Result<SweepReport> {
        let mut conn = self.pool.get().await?;
        conn.transaction::<SweepReport, QueueError, _>(|conn| {
            Box::pin(async move {
                let mut report = SweepReport {
                    swept: true,
                    ..Default::default()
                };
                let cutoff = (Utc::now() - chrono::Duration::seconds(max_age_secs)).to_rfc3339();

                let expired: Vec<WorkerSessionRecord> = worker_sessions::table
                    .filter(worker_sessions::last_heartbeat.lt(&cutoff))
                    .load(conn)
                    .await?;

                for session in &expired {
                    let comment = format!(
                        "automatically reverted: worker session {} missed its heartbeat deadline",
                        session.session_uuid
                    );
                    let (reverted, repaired) =
                        revert_session_locks(conn, session.id, &comment).await?;
                    report.reverted_locks += reverted;
                    report.repaired_locks += repaired;

                    diesel::delete(worker_sessions::table.find(session.id))
                        .execute(conn)
                        .await?;
                    report.expired_sessions += 1;
                    tracing::info!(
                        "expired worker session {} removed ({} locks reverted)",
                        session.session_uuid,
                        reverted
                    );
                }

                // Locks owned by no session at all: corrupt lease state,
                // repaired by treating the files as immediately recoverable.
                let orphans: Vec<LockedFileRecord> = locked_files::table
                    .filter(
                        locked_files::worker_id
                            .ne_all(worker_sessions::table.select(worker_sessions::id)),
                    )
                    .load(conn)
                    .await?;
                for lock in &orphans {
                    tracing::warn!(
                        "lock on file {} action {} references missing worker session {}; reverting",
                        lock.file_id,
                        lock.action_id,
                        lock.worker_id
                    );
                    if revert_lock(conn, lock, "automatically reverted: lock had no live worker session")
                        .await?
                    {
                        report.reverted_locks += 1;
                    } else {
                        report.repaired_locks += 1;
                    }
                }

                Ok(report)
            })
        })
        .await
    }
}

/// Revert every lock a session holds. Returns (reverted, repaired).
async fn revert_session_locks(
    conn: &mut SqliteConn,
    worker_id: i32,
    comment: &str,
) -> Result<(usize, usize)> {
    let locks: Vec<LockedFileRecord> = locked_files::table
        .filter(locked_files::worker_id.eq(worker_id))
        .load(conn)
        .await?;

    let mut reverted = 0usize;
    let mut repaired = 0usize;
    for lock in &locks {
        if revert_lock(conn, lock, comment).await? {
            reverted += 1;
        } else {
            repaired += 1;
        }
    }
    Ok((reverted, repaired))
}

/// Revert one lock to its recorded fallback status.
///
/// Returns true when a transition was applied, false when the lock was
/// merely repaired (the pair was not Processing, or the fallback status was
/// unreadable).
async fn revert_lock(conn: &mut SqliteConn, lock: &LockedFileRecord, comment: &str) -> Result<bool> {
    let fallback = match ActionStatus::from_str(&lock.status_before_lock) {
        Some(status) if status != ActionStatus::Processing => status,
        other => {
            tracing::warn!(
                "lock on file {} action {} has unusable fallback status {:?}; reverting to pending",
                lock.file_id,
                lock.action_id,
                other
            );
            ActionStatus::Pending
        }
    };

    let req = TransitionRequest {
        file_id: lock.file_id,
        action_id: lock.action_id,
        target: fallback,
        actor: recovery_actor(),
        opts: TransitionOptions {
            comment: Some(comment.to_string()),
            ..Default::default()
        },
        kind: TransitionKind::Recovery,
    };

    match transition::apply(conn, &req).await {
        // The engine removed the lock row as part of leaving Processing.
        Ok(TransitionOutcome::Applied { .. }) => Ok(true),
        Ok(_) | Err(QueueError::InvalidTransition { .. }) => {
            // Pair is not Processing but a lock row survived: stale state,
            // drop the lock without touching the status.
            tracing::warn!(
                "removing stale lock on file {} action {} (pair was not processing)",
                lock.file_id,
                lock.action_id
            );
            diesel::delete(locked_files::table.find(lock.id))
                .execute(conn)
                .await?;
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Identity for audit rows written by recovery.
fn recovery_actor() -> ActorContext {
    let mut actor = ActorContext::from_env();
    actor.user = RECOVERY_USER.to_string();
    actor
}

/// Map a database row to the domain session.
fn session_from_record(r: &WorkerSessionRecord) -> WorkerSession {
    WorkerSession {
        id: r.id,
        session_uuid: r.session_uuid.clone(),
        user: r.user.clone(),
        machine: r.machine.clone(),
        pid: r.pid as u32,
        started_at: parse_datetime(&r.started_at),
        last_heartbeat: parse_datetime(&r.last_heartbeat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_throttle_blocks_within_interval() {
        let throttle = SweepThrottle::new(Duration::from_secs(60));
        assert!(throttle.acquire(false).await);
        assert!(!throttle.acquire(false).await);
    }

    #[tokio::test]
    async fn test_throttle_force_bypasses() {
        let throttle = SweepThrottle::new(Duration::from_secs(60));
        assert!(throttle.acquire(false).await);
        assert!(throttle.acquire(true).await);
    }

    #[tokio::test]
    async fn test_throttle_zero_interval_always_sweeps() {
        let throttle = SweepThrottle::new(Duration::from_secs(0));
        assert!(throttle.acquire(false).await);
        assert!(throttle.acquire(false).await);
    }

    #[test]
    fn test_session_from_record() {
        let now = Utc::now().to_rfc3339();
        let record = WorkerSessionRecord {
            id: 9,
            session_uuid: "u".to_string(),
            user: "w".to_string(),
            machine: "m".to_string(),
            pid: 1234,
            started_at: now.clone(),
            last_heartbeat: now,
        };
        let session = session_from_record(&record);
        assert_eq!(session.id, 9);
        assert_eq!(session.pid, 1234);
        assert!(!session.is_stale(60));
    }
}
