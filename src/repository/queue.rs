//! Queue operations: enqueue, claim, report, and status reads.
//!
//! `claim_batch` is the entry point workers call in a loop. Claims run the
//! lease sweep first so files orphaned by crashed workers are eligible again,
//! then flip the selected rows to Processing atomically - the whole batch
//! commits or none of it does.

use std::path::Path;

use chrono::Utc;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use crate::models::{
    Action, ActionStatus, ActorContext, ClaimedFile, EnqueueOutcome, QueuedFile, StatusTransition,
};
use crate::schema::{
    actions, file_action_status, files, skipped_files, status_transitions, workflows,
};

use super::records::{
    ActionRecord, FileActionStatusRecord, FileRecord, NewAction, NewFile, NewWorkflow,
    StatusTransitionRecord,
};
use super::retry::with_retry;
use super::sessions::SessionRepository;
use super::transition::{self, TransitionOptions, TransitionOutcome, TransitionRequest};
use super::{parse_datetime, AsyncSqlitePool, QueueError, Result, SqliteConn};

/// Knobs for a batch claim.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimOptions {
    /// Also claim files skipped by someone other than the caller.
    pub include_skipped: bool,
    /// Only claim files at or above this priority.
    pub priority_floor: Option<i32>,
}

/// An enqueue request for one file/action pair.
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub path: std::path::PathBuf,
    pub action: String,
    pub workflow: Option<String>,
    pub priority: i32,
    pub size: u64,
    pub pages: u32,
    /// Reset a Complete/Failed/Skipped pair back to Pending. A pair locked by
    /// another worker gets the reset deferred instead.
    pub force: bool,
}

/// Repository for the file/action queue.
#[derive(Clone)]
pub struct QueueRepository {
    pool: AsyncSqlitePool,
    sessions: SessionRepository,
    retry_attempts: u32,
}

impl QueueRepository {
    pub(crate) fn new(pool: AsyncSqlitePool, sessions: SessionRepository, retry_attempts: u32) -> Self {
        Self {
            pool,
            sessions,
            retry_attempts,
        }
    }

    /// Look up an action by name and optional workflow scope.
    pub async fn find_action(&self, name: &str, workflow: Option<&str>) -> Result<Action> {
        let mut conn = self.pool.get().await?;
        let record = find_action_tx(&mut conn, name, workflow)
            .await?
            .ok_or_else(|| QueueError::NotFound(format!("action {name:?}")))?;
        Ok(action_from_record(&record))
    }

    /// Look up an action, creating it (and its workflow) if absent.
    pub async fn ensure_action(&self, name: &str, workflow: Option<&str>) -> Result<Action> {
        let name = name.to_string();
        let workflow = workflow.map(str::to_string);
        with_retry(self.retry_attempts, "ensure action", || {
            self.ensure_action_inner(name.clone(), workflow.clone())
        })
        .await
    }

    async fn ensure_action_inner(&self, name: String, workflow: Option<String>) -> Result<Action> {
        let mut conn = self.pool.get().await?;
        conn.transaction::<Action, QueueError, _>(|conn| {
            Box::pin(async move {
                let record = ensure_action_tx(conn, &name, workflow.as_deref()).await?;
                Ok(action_from_record(&record))
            })
        })
        .await
    }

    /// List all known actions.
    pub async fn list_actions(&self) -> Result<Vec<Action>> {
        let mut conn = self.pool.get().await?;
        let records: Vec<ActionRecord> = actions::table.order(actions::name.asc()).load(&mut conn).await?;
        Ok(records.iter().map(action_from_record).collect())
    }

    /// Look up a file by path.
    pub async fn find_file(&self, path: &Path) -> Result<QueuedFile> {
        let mut conn = self.pool.get().await?;
        let path_str = path.display().to_string();
        let record: FileRecord = files::table
            .filter(files::path.eq(&path_str))
            .first(&mut conn)
            .await
            .optional()?
            .ok_or_else(|| QueueError::NotFound(format!("file {path_str:?}")))?;
        Ok(file_from_record(&record))
    }

    /// Add a file to the queue for an action.
    ///
    /// Creates the file and action rows on first reference. An existing pair
    /// in Pending just has its priority refreshed; a finished or skipped pair
    /// is re-queued only when `force` is set.
    pub async fn enqueue_file(&self, actor: &ActorContext, req: EnqueueRequest) -> Result<EnqueueOutcome> {
        let actor = actor.clone();
        with_retry(self.retry_attempts, "enqueue file", || {
            self.enqueue_file_inner(actor.clone(), req.clone())
        })
        .await
    }

    async fn enqueue_file_inner(
        &self,
        actor: ActorContext,
        req: EnqueueRequest,
    ) -> Result<EnqueueOutcome> {
        let mut conn = self.pool.get().await?;
        conn.transaction::<EnqueueOutcome, QueueError, _>(|conn| {
            Box::pin(async move {
                let action = ensure_action_tx(conn, &req.action, req.workflow.as_deref()).await?;
                let path_str = req.path.display().to_string();

                let existing: Option<FileRecord> = files::table
                    .filter(files::path.eq(&path_str))
                    .first(conn)
                    .await
                    .optional()?;
                let already_existed = existing.is_some();

                let file = match existing {
                    Some(file) => file,
                    None => {
                        let now = Utc::now().to_rfc3339();
                        diesel::insert_into(files::table)
                            .values(&NewFile {
                                path: &path_str,
                                file_size: req.size as i64,
                                page_count: req.pages as i32,
                                priority: req.priority,
                                added_at: &now,
                            })
                            .execute(conn)
                            .await?;
                        files::table
                            .filter(files::path.eq(&path_str))
                            .first(conn)
                            .await?
                    }
                };

                let row: Option<FileActionStatusRecord> = file_action_status::table
                    .filter(file_action_status::file_id.eq(file.id))
                    .filter(file_action_status::action_id.eq(action.id))
                    .first(conn)
                    .await
                    .optional()?;
                let previous = row
                    .as_ref()
                    .and_then(|r| ActionStatus::from_str(&r.status))
                    .unwrap_or(ActionStatus::Unattempted);

                // Size and pages are immutable once recorded, unless the pair
                // is being reprocessed from scratch.
                if already_existed && previous == ActionStatus::Unattempted {
                    diesel::update(files::table.find(file.id))
                        .set((
                            files::file_size.eq(req.size as i64),
                            files::page_count.eq(req.pages as i32),
                            files::priority.eq(req.priority),
                        ))
                        .execute(conn)
                        .await?;
                }

                match previous {
                    ActionStatus::Unattempted => {
                        transition::apply_and_drain(
                            conn,
                            TransitionRequest::new(
                                file.id,
                                action.id,
                                ActionStatus::Pending,
                                &actor,
                                TransitionOptions::default(),
                            ),
                        )
                        .await?;
                    }
                    ActionStatus::Pending => {
                        if let Some(row) = &row {
                            diesel::update(file_action_status::table.find(row.id))
                                .set(file_action_status::priority.eq(req.priority))
                                .execute(conn)
                                .await?;
                        }
                    }
                    ActionStatus::Processing
                    | ActionStatus::Complete
                    | ActionStatus::Failed
                    | ActionStatus::Skipped
                        if req.force =>
                    {
                        // A pair locked elsewhere defers the reset instead of
                        // failing the enqueue.
                        transition::apply_and_drain(
                            conn,
                            TransitionRequest::new(
                                file.id,
                                action.id,
                                ActionStatus::Pending,
                                &actor,
                                TransitionOptions {
                                    comment: Some("re-queued by enqueue".to_string()),
                                    ..Default::default()
                                },
                            ),
                        )
                        .await?;
                    }
                    _ => {}
                }

                Ok(EnqueueOutcome {
                    file_id: file.id,
                    already_existed,
                    previous_status: previous,
                })
            })
        })
        .await
    }

    /// Remove a Pending file from the queue (back to Unattempted).
    pub async fn remove_from_queue(
        &self,
        actor: &ActorContext,
        path: &Path,
        action_id: i32,
    ) -> Result<TransitionOutcome> {
        let file = self.find_file(path).await?;
        self.set_status(
            actor,
            file.id,
            action_id,
            ActionStatus::Unattempted,
            TransitionOptions::default(),
        )
        .await
    }

    /// Claim up to `max_count` files for an action.
    ///
    /// Runs the throttled lease sweep first, then selects Pending rows (and
    /// reclaimable Skipped rows when requested) by priority and tiebreak, and
    /// flips them to Processing in one transaction.
    pub async fn claim_batch(
        &self,
        actor: &ActorContext,
        action_id: i32,
        max_count: u32,
        opts: ClaimOptions,
    ) -> Result<Vec<ClaimedFile>> {
        if actor.worker_id.is_none() {
            return Err(QueueError::NoWorkerSession);
        }
        self.sessions.sweep_expired(false).await?;

        let actor = actor.clone();
        with_retry(self.retry_attempts, "claim batch", || {
            self.claim_batch_inner(actor.clone(), action_id, max_count, opts)
        })
        .await
    }

    async fn claim_batch_inner(
        &self,
        actor: ActorContext,
        action_id: i32,
        max_count: u32,
        opts: ClaimOptions,
    ) -> Result<Vec<ClaimedFile>> {
        let mut conn = self.pool.get().await?;
        conn.transaction::<Vec<ClaimedFile>, QueueError, _>(|conn| {
            Box::pin(async move {
                let mut candidates = load_claim_candidates(
                    conn,
                    action_id,
                    ActionStatus::Pending,
                    max_count as i64,
                    opts.priority_floor,
                    None,
                )
                .await?;

                if opts.include_skipped && (candidates.len() as i64) < max_count as i64 {
                    // Skipped files are claimable by anyone but the user who
                    // skipped them.
                    let reclaimable: Vec<i32> = skipped_files::table
                        .filter(skipped_files::action_id.eq(action_id))
                        .filter(skipped_files::skipped_by_user.ne(&actor.user))
                        .select(skipped_files::file_id)
                        .load(conn)
                        .await?;
                    if !reclaimable.is_empty() {
                        let remaining = max_count as i64 - candidates.len() as i64;
                        let skipped = load_claim_candidates(
                            conn,
                            action_id,
                            ActionStatus::Skipped,
                            remaining,
                            opts.priority_floor,
                            Some(&reclaimable),
                        )
                        .await?;
                        candidates.extend(skipped);
                    }
                }

                let mut claimed = Vec::with_capacity(candidates.len());
                for (_, file) in candidates {
                    let req = TransitionRequest::new(
                        file.id,
                        action_id,
                        ActionStatus::Processing,
                        &actor,
                        TransitionOptions::default(),
                    );
                    match transition::apply(conn, &req).await {
                        Ok(TransitionOutcome::Applied { .. }) => {
                            claimed.push(claimed_from_record(&file));
                        }
                        // Raced with another status change inside this
                        // transaction scope; leave the file for the next call.
                        Ok(_) | Err(QueueError::SkipOwned { .. }) => {}
                        Err(e) => return Err(e),
                    }
                }
                Ok(claimed)
            })
        })
        .await
    }

    /// Claim one specific file, inserting its status row if absent.
    ///
    /// Returns `None` when the file is not claimable by this caller.
    pub async fn claim_one(
        &self,
        actor: &ActorContext,
        file_id: i32,
        action_id: i32,
    ) -> Result<Option<ClaimedFile>> {
        if actor.worker_id.is_none() {
            return Err(QueueError::NoWorkerSession);
        }
        self.sessions.sweep_expired(false).await?;

        let actor = actor.clone();
        with_retry(self.retry_attempts, "claim one", || {
            self.claim_one_inner(actor.clone(), file_id, action_id)
        })
        .await
    }

    async fn claim_one_inner(
        &self,
        actor: ActorContext,
        file_id: i32,
        action_id: i32,
    ) -> Result<Option<ClaimedFile>> {
        let mut conn = self.pool.get().await?;
        conn.transaction::<Option<ClaimedFile>, QueueError, _>(|conn| {
            Box::pin(async move {
                let file: FileRecord = files::table
                    .find(file_id)
                    .first(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| QueueError::NotFound(format!("file {file_id}")))?;

                let current = pair_status(conn, file_id, action_id).await?;

                match current {
                    ActionStatus::Unattempted => {
                        // Queue it first so the claim stays on legal edges.
                        transition::apply(
                            conn,
                            &TransitionRequest::new(
                                file_id,
                                action_id,
                                ActionStatus::Pending,
                                &actor,
                                TransitionOptions::default(),
                            ),
                        )
                        .await?;
                    }
                    ActionStatus::Pending | ActionStatus::Skipped => {}
                    ActionStatus::Processing | ActionStatus::Complete | ActionStatus::Failed => {
                        return Ok(None);
                    }
                }

                let req = TransitionRequest::new(
                    file_id,
                    action_id,
                    ActionStatus::Processing,
                    &actor,
                    TransitionOptions::default(),
                );
                match transition::apply(conn, &req).await {
                    Ok(TransitionOutcome::Applied { .. }) => Ok(Some(claimed_from_record(&file))),
                    Ok(_) | Err(QueueError::SkipOwned { .. }) => Ok(None),
                    Err(e) => Err(e),
                }
            })
        })
        .await
    }

    /// Current status of a file/action pair.
    ///
    /// With `attempt_recovery` set, a Processing result triggers an immediate
    /// (unthrottled) lease sweep and a re-read, so a caller holding a stale
    /// view of a crashed worker sees the recovered status.
    pub async fn get_status(
        &self,
        file_id: i32,
        action_id: i32,
        attempt_recovery: bool,
    ) -> Result<ActionStatus> {
        let status = self.read_status(file_id, action_id).await?;
        if status == ActionStatus::Processing && attempt_recovery {
            self.sessions.sweep_expired(true).await?;
            return self.read_status(file_id, action_id).await;
        }
        Ok(status)
    }

    async fn read_status(&self, file_id: i32, action_id: i32) -> Result<ActionStatus> {
        let mut conn = self.pool.get().await?;
        let known: Option<i32> = files::table
            .find(file_id)
            .select(files::id)
            .first(&mut conn)
            .await
            .optional()?;
        if known.is_none() {
            return Err(QueueError::NotFound(format!("file {file_id}")));
        }
        pair_status(&mut conn, file_id, action_id).await
    }

    /// Apply one status change through the transition engine.
    ///
    /// This is the single public choke-point for status writes; the named
    /// helpers below all delegate to it.
    pub async fn set_status(
        &self,
        actor: &ActorContext,
        file_id: i32,
        action_id: i32,
        target: ActionStatus,
        opts: TransitionOptions,
    ) -> Result<TransitionOutcome> {
        let actor = actor.clone();
        with_retry(self.retry_attempts, "status transition", || {
            self.set_status_inner(actor.clone(), file_id, action_id, target, opts.clone())
        })
        .await
    }

    async fn set_status_inner(
        &self,
        actor: ActorContext,
        file_id: i32,
        action_id: i32,
        target: ActionStatus,
        opts: TransitionOptions,
    ) -> Result<TransitionOutcome> {
        let mut conn = self.pool.get().await?;
        conn.transaction::<TransitionOutcome, QueueError, _>(|conn| {
            Box::pin(async move {
                transition::apply_and_drain(
                    conn,
                    TransitionRequest::new(file_id, action_id, target, &actor, opts),
                )
                .await
            })
        })
        .await
    }

    /// Report successful processing of a claimed file.
    pub async fn report_complete(
        &self,
        actor: &ActorContext,
        file_id: i32,
        action_id: i32,
    ) -> Result<TransitionOutcome> {
        self.set_status(
            actor,
            file_id,
            action_id,
            ActionStatus::Complete,
            TransitionOptions::default(),
        )
        .await
    }

    /// Report failed processing of a claimed file.
    pub async fn report_failed(
        &self,
        actor: &ActorContext,
        file_id: i32,
        action_id: i32,
        exception: &str,
    ) -> Result<TransitionOutcome> {
        self.set_status(
            actor,
            file_id,
            action_id,
            ActionStatus::Failed,
            TransitionOptions {
                exception: Some(exception.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    /// Re-queue a file for an action.
    pub async fn set_pending(
        &self,
        actor: &ActorContext,
        file_id: i32,
        action_id: i32,
    ) -> Result<TransitionOutcome> {
        self.set_status(
            actor,
            file_id,
            action_id,
            ActionStatus::Pending,
            TransitionOptions::default(),
        )
        .await
    }

    /// Remove a file from the queue for an action.
    pub async fn set_unattempted(
        &self,
        actor: &ActorContext,
        file_id: i32,
        action_id: i32,
    ) -> Result<TransitionOutcome> {
        self.set_status(
            actor,
            file_id,
            action_id,
            ActionStatus::Unattempted,
            TransitionOptions::default(),
        )
        .await
    }

    /// Mark a file skipped for an action.
    ///
    /// When the pair is already Skipped by someone else, `remove_previous_skip`
    /// transfers the skip to the acting user so "anyone but me" reclaim
    /// semantics follow the latest skipper.
    pub async fn set_skipped(
        &self,
        actor: &ActorContext,
        file_id: i32,
        action_id: i32,
        remove_previous_skip: bool,
    ) -> Result<TransitionOutcome> {
        let actor = actor.clone();
        with_retry(self.retry_attempts, "skip file", || {
            self.set_skipped_inner(actor.clone(), file_id, action_id, remove_previous_skip)
        })
        .await
    }

    async fn set_skipped_inner(
        &self,
        actor: ActorContext,
        file_id: i32,
        action_id: i32,
        remove_previous_skip: bool,
    ) -> Result<TransitionOutcome> {
        let mut conn = self.pool.get().await?;
        conn.transaction::<TransitionOutcome, QueueError, _>(|conn| {
            Box::pin(async move {
                let outcome = transition::apply_and_drain(
                    conn,
                    TransitionRequest::new(
                        file_id,
                        action_id,
                        ActionStatus::Skipped,
                        &actor,
                        TransitionOptions::default(),
                    ),
                )
                .await?;

                if remove_previous_skip
                    && matches!(outcome, TransitionOutcome::Unchanged { .. })
                {
                    let now = Utc::now().to_rfc3339();
                    diesel::update(
                        skipped_files::table
                            .filter(skipped_files::file_id.eq(file_id))
                            .filter(skipped_files::action_id.eq(action_id)),
                    )
                    .set((
                        skipped_files::skipped_by_user.eq(&actor.user),
                        skipped_files::skipped_at.eq(&now),
                    ))
                    .execute(conn)
                    .await?;
                }

                Ok(outcome)
            })
        })
        .await
    }

    /// Recent audit trail entries for a pair, newest first.
    pub async fn recent_transitions(
        &self,
        file_id: i32,
        action_id: i32,
        limit: u32,
    ) -> Result<Vec<StatusTransition>> {
        let mut conn = self.pool.get().await?;
        let records: Vec<StatusTransitionRecord> = status_transitions::table
            .filter(status_transitions::file_id.eq(file_id))
            .filter(status_transitions::action_id.eq(action_id))
            .order(status_transitions::id.desc())
            .limit(limit as i64)
            .load(&mut conn)
            .await?;
        Ok(records.iter().map(transition_from_record).collect())
    }

    /// Per-status row counts for an action.
    pub async fn queue_summary(&self, action_id: i32) -> Result<Vec<(ActionStatus, i64)>> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<(String, i64)> = file_action_status::table
            .filter(file_action_status::action_id.eq(action_id))
            .group_by(file_action_status::status)
            .select((file_action_status::status, count_star()))
            .load(&mut conn)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(status, count)| ActionStatus::from_str(&status).map(|s| (s, count)))
            .collect())
    }
}

/// Read the current status of a pair; absent row means Unattempted.
async fn pair_status(conn: &mut SqliteConn, file_id: i32, action_id: i32) -> Result<ActionStatus> {
    let status: Option<String> = file_action_status::table
        .filter(file_action_status::file_id.eq(file_id))
        .filter(file_action_status::action_id.eq(action_id))
        .select(file_action_status::status)
        .first(conn)
        .await
        .optional()?;
    Ok(status
        .as_deref()
        .and_then(ActionStatus::from_str)
        .unwrap_or(ActionStatus::Unattempted))
}

/// Load claim candidates in dispatch order.
///
/// Highest priority first; the random tiebreak spreads equal-priority claims
/// across non-adjacent rows of the claim index.
async fn load_claim_candidates(
    conn: &mut SqliteConn,
    action_id: i32,
    status: ActionStatus,
    limit: i64,
    priority_floor: Option<i32>,
    restrict_to: Option<&[i32]>,
) -> Result<Vec<(FileActionStatusRecord, FileRecord)>> {
    if limit <= 0 {
        return Ok(Vec::new());
    }
    let mut query = file_action_status::table
        .inner_join(files::table)
        .filter(file_action_status::action_id.eq(action_id))
        .filter(file_action_status::status.eq(status.as_str()))
        .order((
            file_action_status::priority.desc(),
            file_action_status::random_tiebreak.asc(),
        ))
        .limit(limit)
        .select((
            FileActionStatusRecord::as_select(),
            FileRecord::as_select(),
        ))
        .into_boxed();
    if let Some(floor) = priority_floor {
        query = query.filter(file_action_status::priority.ge(floor));
    }
    if let Some(ids) = restrict_to {
        query = query.filter(file_action_status::file_id.eq_any(ids.to_vec()));
    }
    Ok(query.load(conn).await?)
}

/// Find an action by name and workflow scope.
async fn find_action_tx(
    conn: &mut SqliteConn,
    name: &str,
    workflow: Option<&str>,
) -> Result<Option<ActionRecord>> {
    let workflow_id = match workflow {
        Some(wf) => {
            let id: Option<i32> = workflows::table
                .filter(workflows::name.eq(wf))
                .select(workflows::id)
                .first(conn)
                .await
                .optional()?;
            match id {
                Some(id) => Some(id),
                None => return Ok(None),
            }
        }
        None => None,
    };

    let mut query = actions::table.filter(actions::name.eq(name)).into_boxed();
    query = match workflow_id {
        Some(id) => query.filter(actions::workflow_id.eq(id)),
        None => query.filter(actions::workflow_id.is_null()),
    };
    Ok(query.first(conn).await.optional()?)
}

/// Find or create an action (and its workflow scope).
async fn ensure_action_tx(
    conn: &mut SqliteConn,
    name: &str,
    workflow: Option<&str>,
) -> Result<ActionRecord> {
    let workflow_id = match workflow {
        Some(wf) => {
            let existing: Option<i32> = workflows::table
                .filter(workflows::name.eq(wf))
                .select(workflows::id)
                .first(conn)
                .await
                .optional()?;
            match existing {
                Some(id) => Some(id),
                None => {
                    diesel::insert_into(workflows::table)
                        .values(&NewWorkflow { name: wf })
                        .execute(conn)
                        .await?;
                    let id: i32 = workflows::table
                        .filter(workflows::name.eq(wf))
                        .select(workflows::id)
                        .first(conn)
                        .await?;
                    Some(id)
                }
            }
        }
        None => None,
    };

    let mut query = actions::table.filter(actions::name.eq(name)).into_boxed();
    query = match workflow_id {
        Some(id) => query.filter(actions::workflow_id.eq(id)),
        None => query.filter(actions::workflow_id.is_null()),
    };
    if let Some(existing) = query.first::<ActionRecord>(conn).await.optional()? {
        return Ok(existing);
    }

    diesel::insert_into(actions::table)
        .values(&NewAction { name, workflow_id })
        .execute(conn)
        .await?;

    let mut reload = actions::table.filter(actions::name.eq(name)).into_boxed();
    reload = match workflow_id {
        Some(id) => reload.filter(actions::workflow_id.eq(id)),
        None => reload.filter(actions::workflow_id.is_null()),
    };
    Ok(reload.first(conn).await?)
}

fn action_from_record(r: &ActionRecord) -> Action {
    Action {
        id: r.id,
        name: r.name.clone(),
        workflow_id: r.workflow_id,
    }
}

fn file_from_record(r: &FileRecord) -> QueuedFile {
    QueuedFile {
        id: r.id,
        path: std::path::PathBuf::from(&r.path),
        size: r.file_size.max(0) as u64,
        pages: r.page_count.max(0) as u32,
        priority: r.priority,
        added_at: parse_datetime(&r.added_at),
    }
}

fn claimed_from_record(r: &FileRecord) -> ClaimedFile {
    ClaimedFile {
        file_id: r.id,
        path: std::path::PathBuf::from(&r.path),
        size: r.file_size.max(0) as u64,
        pages: r.page_count.max(0) as u32,
        priority: r.priority,
    }
}

fn transition_from_record(r: &StatusTransitionRecord) -> StatusTransition {
    StatusTransition {
        file_id: r.file_id,
        action_id: r.action_id,
        from_status: ActionStatus::from_str(&r.from_status).unwrap_or(ActionStatus::Unattempted),
        to_status: ActionStatus::from_str(&r.to_status).unwrap_or(ActionStatus::Unattempted),
        changed_at: parse_datetime(&r.changed_at),
        user: r.user.clone(),
        machine: r.machine.clone(),
        exception: r.exception.clone(),
        comment: r.comment.clone(),
    }
}
