//! Database context for managing connections and repository access.
//!
//! The DbContext is the primary entry point for all queue operations. It
//! holds the connection factory, the process-local sweep throttle, and the
//! tuning knobs shared by the repositories it hands out.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use diesel_async::SimpleAsyncConnection;

use super::pool::{AsyncSqlitePool, DieselError};
use super::queue::QueueRepository;
use super::sessions::{SessionRepository, SweepThrottle};
use super::stats::StatsRepository;

/// Tuning knobs shared by the repositories.
#[derive(Debug, Clone)]
pub struct Tuning {
    /// Heartbeat age after which a worker session is presumed dead.
    pub session_timeout_secs: i64,
    /// Minimum interval between lease sweeps from this process.
    pub sweep_min_interval_secs: u64,
    /// How long a statistics consolidation may be reused without re-merging.
    pub stats_staleness_secs: i64,
    /// Attempts per unit of work on transient store failures.
    pub retry_attempts: u32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            session_timeout_secs: 90,
            sweep_min_interval_secs: 30,
            stats_staleness_secs: 30,
            retry_attempts: 3,
        }
    }
}

/// Database context that provides repository access.
///
/// # Example
/// ```ignore
/// let ctx = DbContext::new(&db_path);
/// ctx.init_schema().await?;
/// let claimed = ctx.queue().claim_batch(&actor, action.id, 10, Default::default()).await?;
/// ```
#[derive(Clone)]
pub struct DbContext {
    pool: AsyncSqlitePool,
    throttle: Arc<SweepThrottle>,
    tuning: Tuning,
}

impl DbContext {
    /// Create a context from a database file path with default tuning.
    pub fn new(db_path: &Path) -> Self {
        Self::with_tuning(db_path, Tuning::default())
    }

    /// Create a context with explicit tuning.
    pub fn with_tuning(db_path: &Path, tuning: Tuning) -> Self {
        let throttle = Arc::new(SweepThrottle::new(Duration::from_secs(
            tuning.sweep_min_interval_secs,
        )));
        Self {
            pool: AsyncSqlitePool::from_path(db_path),
            throttle,
            tuning,
        }
    }

    /// Create a context from a database URL (`sqlite:` prefix optional).
    pub fn from_url(url: &str, tuning: Tuning) -> Self {
        let throttle = Arc::new(SweepThrottle::new(Duration::from_secs(
            tuning.sweep_min_interval_secs,
        )));
        Self {
            pool: AsyncSqlitePool::new(url),
            throttle,
            tuning,
        }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &AsyncSqlitePool {
        &self.pool
    }

    /// Get a queue repository.
    pub fn queue(&self) -> QueueRepository {
        QueueRepository::new(self.pool.clone(), self.sessions(), self.tuning.retry_attempts)
    }

    /// Get a session repository.
    pub fn sessions(&self) -> SessionRepository {
        SessionRepository::new(
            self.pool.clone(),
            self.throttle.clone(),
            self.tuning.session_timeout_secs,
            self.tuning.retry_attempts,
        )
    }

    /// Get a statistics repository.
    pub fn stats(&self) -> StatsRepository {
        StatsRepository::new(
            self.pool.clone(),
            self.tuning.stats_staleness_secs,
            self.tuning.retry_attempts,
        )
    }

    /// Initialize the database schema.
    pub async fn init_schema(&self) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        conn.batch_execute(
            r#"
            -- Files known to the queue, one row per unique path
            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL UNIQUE,
                file_size INTEGER NOT NULL DEFAULT 0,
                page_count INTEGER NOT NULL DEFAULT 0,
                priority INTEGER NOT NULL DEFAULT 0,
                added_at TEXT NOT NULL
            );

            -- Workflow scopes
            CREATE TABLE IF NOT EXISTS workflows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            -- Pipeline steps, optionally scoped to a workflow
            CREATE TABLE IF NOT EXISTS actions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                workflow_id INTEGER REFERENCES workflows(id)
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_actions_name_workflow
                ON actions(name, COALESCE(workflow_id, 0));

            -- Current status per file per action; absent row means unattempted
            CREATE TABLE IF NOT EXISTS file_action_status (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id INTEGER NOT NULL REFERENCES files(id),
                action_id INTEGER NOT NULL REFERENCES actions(id),
                status TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 0,
                random_tiebreak INTEGER NOT NULL DEFAULT 0,
                UNIQUE(file_id, action_id)
            );
            -- Claim index: dispatch order is priority, then tiebreak
            CREATE INDEX IF NOT EXISTS idx_fas_claim
                ON file_action_status(action_id, status, priority DESC, random_tiebreak);

            -- Registered worker processes
            CREATE TABLE IF NOT EXISTS worker_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_uuid TEXT NOT NULL UNIQUE,
                user TEXT NOT NULL,
                machine TEXT NOT NULL,
                pid INTEGER NOT NULL,
                started_at TEXT NOT NULL,
                last_heartbeat TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_heartbeat
                ON worker_sessions(last_heartbeat);

            -- Lock ownership; exists iff the pair is processing
            CREATE TABLE IF NOT EXISTS locked_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id INTEGER NOT NULL REFERENCES files(id),
                action_id INTEGER NOT NULL REFERENCES actions(id),
                worker_id INTEGER NOT NULL,
                status_before_lock TEXT NOT NULL,
                locked_at TEXT NOT NULL,
                UNIQUE(file_id, action_id)
            );
            CREATE INDEX IF NOT EXISTS idx_locked_worker
                ON locked_files(worker_id);

            -- Append-only status audit trail
            CREATE TABLE IF NOT EXISTS status_transitions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id INTEGER NOT NULL REFERENCES files(id),
                action_id INTEGER NOT NULL REFERENCES actions(id),
                from_status TEXT NOT NULL,
                to_status TEXT NOT NULL,
                changed_at TEXT NOT NULL,
                user TEXT NOT NULL,
                machine TEXT NOT NULL,
                exception TEXT,
                comment TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_transitions_pair
                ON status_transitions(file_id, action_id, id);

            -- Consolidated statistics per action
            CREATE TABLE IF NOT EXISTS action_stats (
                action_id INTEGER PRIMARY KEY REFERENCES actions(id),
                pending_documents INTEGER NOT NULL DEFAULT 0,
                pending_pages INTEGER NOT NULL DEFAULT 0,
                pending_bytes INTEGER NOT NULL DEFAULT 0,
                processing_documents INTEGER NOT NULL DEFAULT 0,
                processing_pages INTEGER NOT NULL DEFAULT 0,
                processing_bytes INTEGER NOT NULL DEFAULT 0,
                complete_documents INTEGER NOT NULL DEFAULT 0,
                complete_pages INTEGER NOT NULL DEFAULT 0,
                complete_bytes INTEGER NOT NULL DEFAULT 0,
                failed_documents INTEGER NOT NULL DEFAULT 0,
                failed_pages INTEGER NOT NULL DEFAULT 0,
                failed_bytes INTEGER NOT NULL DEFAULT 0,
                skipped_documents INTEGER NOT NULL DEFAULT 0,
                skipped_pages INTEGER NOT NULL DEFAULT 0,
                skipped_bytes INTEGER NOT NULL DEFAULT 0,
                invisible_documents INTEGER NOT NULL DEFAULT 0,
                invisible_pages INTEGER NOT NULL DEFAULT 0,
                invisible_bytes INTEGER NOT NULL DEFAULT 0,
                last_delta_id INTEGER NOT NULL DEFAULT 0,
                consolidated_at TEXT
            );

            -- Append-only statistics deltas, merged on read
            CREATE TABLE IF NOT EXISTS action_stats_deltas (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                action_id INTEGER NOT NULL REFERENCES actions(id),
                status TEXT NOT NULL,
                documents INTEGER NOT NULL DEFAULT 0,
                pages INTEGER NOT NULL DEFAULT 0,
                bytes INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_deltas_action
                ON action_stats_deltas(action_id);

            -- Workflow membership / visibility markers
            CREATE TABLE IF NOT EXISTS workflow_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workflow_id INTEGER NOT NULL REFERENCES workflows(id),
                file_id INTEGER NOT NULL REFERENCES files(id),
                invisible INTEGER NOT NULL DEFAULT 0,
                UNIQUE(workflow_id, file_id)
            );

            -- Skip ownership; exists iff the pair is skipped
            CREATE TABLE IF NOT EXISTS skipped_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id INTEGER NOT NULL REFERENCES files(id),
                action_id INTEGER NOT NULL REFERENCES actions(id),
                skipped_by_user TEXT NOT NULL,
                skipped_at TEXT NOT NULL,
                UNIQUE(file_id, action_id)
            );

            -- Status changes deferred while the pair was locked elsewhere
            CREATE TABLE IF NOT EXISTS queued_status_changes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id INTEGER NOT NULL REFERENCES files(id),
                action_id INTEGER NOT NULL REFERENCES actions(id),
                target_status TEXT NOT NULL,
                exception TEXT,
                requested_by TEXT NOT NULL,
                requested_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_queued_changes_pair
                ON queued_status_changes(file_id, action_id, id);
        "#,
        )
        .await
    }
}
