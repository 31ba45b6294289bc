//! The state transition engine.
//!
//! Every status change for a file/action pair funnels through [`apply`]: the
//! status write, the audit trail append, the statistics delta, and the
//! skip/lock bookkeeping happen as one unit inside the caller's transaction.
//!
//! A change that targets a pair currently Processing under another worker's
//! lock is not applied; it is captured in the deferred-change queue and
//! replayed (last writer wins) once the owner leaves Processing.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::models::{ActionStatus, ActorContext};
use crate::schema::{
    actions, file_action_status, files, locked_files, queued_status_changes, skipped_files,
    status_transitions,
};

use super::records::{
    FileActionStatusRecord, FileRecord, LockedFileRecord, NewFileActionStatus, NewLockedFile,
    NewQueuedStatusChange, NewSkippedFile, NewStatusTransition, QueuedStatusChangeRecord,
    SkippedFileRecord,
};
use super::{stats, QueueError, Result, SqliteConn};

/// Caller-supplied knobs for a single transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionOptions {
    /// Exception detail recorded with a failure report.
    pub exception: Option<String>,
    /// Free-form audit comment.
    pub comment: Option<String>,
    /// Status to restore on crash recovery, instead of the status the pair
    /// held when the claim was taken.
    pub fallback_status: Option<ActionStatus>,
    /// Apply the change even if another worker holds the lock, invalidating
    /// that worker's lock instead of deferring.
    pub allow_override: bool,
    /// Permit reclaiming a file the acting user skipped themselves.
    pub allow_reclaim_own_skip: bool,
}

/// What a transition request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The status changed; `previous` is the status before the change.
    Applied { previous: ActionStatus },
    /// The pair was already in the requested status; nothing was written.
    Unchanged { current: ActionStatus },
    /// The pair is locked by another worker; the request was queued for
    /// replay and the status is unchanged.
    Deferred { current: ActionStatus },
}

/// How a transition entered the engine; relaxes validation for internal paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransitionKind {
    /// Caller-initiated; full edge and ownership validation.
    Normal,
    /// Lease-sweep revert of an expired claim; bypasses lock ownership and is
    /// legal only from Processing.
    Recovery,
    /// Replay of a deferred change; was validated when captured.
    DeferredReplay,
}

/// A fully-specified transition, ready for [`apply`].
#[derive(Debug, Clone)]
pub(crate) struct TransitionRequest {
    pub file_id: i32,
    pub action_id: i32,
    pub target: ActionStatus,
    pub actor: ActorContext,
    pub opts: TransitionOptions,
    pub kind: TransitionKind,
}

impl TransitionRequest {
    pub fn new(
        file_id: i32,
        action_id: i32,
        target: ActionStatus,
        actor: &ActorContext,
        opts: TransitionOptions,
    ) -> Self {
        Self {
            file_id,
            action_id,
            target,
            actor: actor.clone(),
            opts,
            kind: TransitionKind::Normal,
        }
    }
}

/// Tiebreak value for a fresh status row.
///
/// Assigned once at row creation so equal-priority claims land on
/// non-adjacent rows of the claim index.
pub(crate) fn random_tiebreak() -> i32 {
    (Uuid::new_v4().as_u128() & 0x7fff_ffff) as i32
}

/// Apply one transition inside the caller's transaction.
pub(crate) async fn apply(conn: &mut SqliteConn, req: &TransitionRequest) -> Result<TransitionOutcome> {
    let file: FileRecord = files::table
        .find(req.file_id)
        .first::<FileRecord>(conn)
        .await
        .optional()?
        .ok_or_else(|| QueueError::NotFound(format!("file {}", req.file_id)))?;

    let action_known: Option<i32> = actions::table
        .find(req.action_id)
        .select(actions::id)
        .first(conn)
        .await
        .optional()?;
    if action_known.is_none() {
        return Err(QueueError::NotFound(format!("action {}", req.action_id)));
    }

    let row: Option<FileActionStatusRecord> = file_action_status::table
        .filter(file_action_status::file_id.eq(req.file_id))
        .filter(file_action_status::action_id.eq(req.action_id))
        .first(conn)
        .await
        .optional()?;

    let current = row
        .as_ref()
        .and_then(|r| ActionStatus::from_str(&r.status))
        .unwrap_or(ActionStatus::Unattempted);

    if current == req.target {
        return Ok(TransitionOutcome::Unchanged { current });
    }

    // A Processing pair may only be altered by its lock owner. Everyone else
    // either defers or, with the override flag, invalidates the stale lock.
    if current == ActionStatus::Processing {
        let lock: Option<LockedFileRecord> = locked_files::table
            .filter(locked_files::file_id.eq(req.file_id))
            .filter(locked_files::action_id.eq(req.action_id))
            .first(conn)
            .await
            .optional()?;
        match lock {
            Some(lock) => {
                let owned = req.actor.worker_id == Some(lock.worker_id);
                if !owned && req.kind == TransitionKind::Normal {
                    if req.opts.allow_override {
                        // Remove the stale lock so recovery cannot replay the
                        // status it was holding.
                        diesel::delete(locked_files::table.filter(locked_files::id.eq(lock.id)))
                            .execute(conn)
                            .await?;
                    } else {
                        defer(conn, req).await?;
                        return Ok(TransitionOutcome::Deferred { current });
                    }
                }
            }
            None => {
                tracing::warn!(
                    "file {} action {} is processing without a lock row; repairing",
                    req.file_id,
                    req.action_id
                );
            }
        }
    }

    let legal = match req.kind {
        TransitionKind::Normal => current.can_transition_to(req.target),
        TransitionKind::Recovery => current == ActionStatus::Processing,
        TransitionKind::DeferredReplay => true,
    };
    if !legal {
        return Err(QueueError::InvalidTransition {
            from: current,
            to: req.target,
        });
    }

    // Skip ownership: only someone other than the skipper may reclaim.
    if req.target == ActionStatus::Processing && current == ActionStatus::Skipped {
        let skip: Option<SkippedFileRecord> = skipped_files::table
            .filter(skipped_files::file_id.eq(req.file_id))
            .filter(skipped_files::action_id.eq(req.action_id))
            .first(conn)
            .await
            .optional()?;
        if let Some(skip) = skip {
            if skip.skipped_by_user == req.actor.user && !req.opts.allow_reclaim_own_skip {
                return Err(QueueError::SkipOwned {
                    owner: skip.skipped_by_user,
                });
            }
        }
    }

    let now = Utc::now().to_rfc3339();

    match &row {
        Some(row) => {
            diesel::update(file_action_status::table.find(row.id))
                .set(file_action_status::status.eq(req.target.as_str()))
                .execute(conn)
                .await?;
        }
        None => {
            diesel::insert_into(file_action_status::table)
                .values(&NewFileActionStatus {
                    file_id: req.file_id,
                    action_id: req.action_id,
                    status: req.target.as_str(),
                    priority: file.priority,
                    random_tiebreak: random_tiebreak(),
                })
                .execute(conn)
                .await?;
        }
    }

    if req.target == ActionStatus::Processing {
        let worker_id = req.actor.worker_id.ok_or(QueueError::NoWorkerSession)?;
        let fallback = req.opts.fallback_status.unwrap_or(current);
        diesel::insert_into(locked_files::table)
            .values(&NewLockedFile {
                file_id: req.file_id,
                action_id: req.action_id,
                worker_id,
                status_before_lock: fallback.as_str(),
                locked_at: &now,
            })
            .execute(conn)
            .await?;
    } else if current == ActionStatus::Processing {
        diesel::delete(
            locked_files::table
                .filter(locked_files::file_id.eq(req.file_id))
                .filter(locked_files::action_id.eq(req.action_id)),
        )
        .execute(conn)
        .await?;
    }

    if req.target == ActionStatus::Skipped {
        diesel::replace_into(skipped_files::table)
            .values(&NewSkippedFile {
                file_id: req.file_id,
                action_id: req.action_id,
                skipped_by_user: &req.actor.user,
                skipped_at: &now,
            })
            .execute(conn)
            .await?;
    } else if current == ActionStatus::Skipped {
        diesel::delete(
            skipped_files::table
                .filter(skipped_files::file_id.eq(req.file_id))
                .filter(skipped_files::action_id.eq(req.action_id)),
        )
        .execute(conn)
        .await?;
    }

    diesel::insert_into(status_transitions::table)
        .values(&NewStatusTransition {
            file_id: req.file_id,
            action_id: req.action_id,
            from_status: current.as_str(),
            to_status: req.target.as_str(),
            changed_at: &now,
            user: &req.actor.user,
            machine: &req.actor.machine,
            exception: req.opts.exception.as_deref(),
            comment: req.opts.comment.as_deref(),
        })
        .execute(conn)
        .await?;

    stats::push_transition_delta(
        conn,
        req.action_id,
        current,
        req.target,
        file.file_size,
        file.page_count as i64,
    )
    .await?;

    Ok(TransitionOutcome::Applied { previous: current })
}

/// Apply a transition and, when the owner leaves Processing, replay any
/// deferred change that was waiting on the lock.
pub(crate) async fn apply_and_drain(
    conn: &mut SqliteConn,
    req: TransitionRequest,
) -> Result<TransitionOutcome> {
    let outcome = apply(conn, &req).await?;
    if req.kind == TransitionKind::Normal
        && matches!(
            outcome,
            TransitionOutcome::Applied {
                previous: ActionStatus::Processing
            }
        )
        && matches!(
            req.target,
            ActionStatus::Complete | ActionStatus::Failed | ActionStatus::Pending
        )
    {
        drain_deferred(conn, req.file_id, req.action_id, &req.actor.machine).await?;
    }
    Ok(outcome)
}

/// Capture a conflicting change for later replay.
async fn defer(conn: &mut SqliteConn, req: &TransitionRequest) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    diesel::insert_into(queued_status_changes::table)
        .values(&NewQueuedStatusChange {
            file_id: req.file_id,
            action_id: req.action_id,
            target_status: req.target.as_str(),
            exception: req.opts.exception.as_deref(),
            requested_by: &req.actor.user,
            requested_at: &now,
        })
        .execute(conn)
        .await?;
    Ok(())
}

/// Replay the most recent deferred change for a pair, dropping older ones.
///
/// Earlier queued requests targeted a state that no longer applies; only the
/// last writer is replayed.
pub(crate) async fn drain_deferred(
    conn: &mut SqliteConn,
    file_id: i32,
    action_id: i32,
    machine: &str,
) -> Result<usize> {
    let mut applied = 0usize;
    loop {
        let latest: Option<QueuedStatusChangeRecord> = queued_status_changes::table
            .filter(queued_status_changes::file_id.eq(file_id))
            .filter(queued_status_changes::action_id.eq(action_id))
            .order(queued_status_changes::id.desc())
            .first(conn)
            .await
            .optional()?;
        let Some(change) = latest else { break };

        diesel::delete(
            queued_status_changes::table
                .filter(queued_status_changes::file_id.eq(file_id))
                .filter(queued_status_changes::action_id.eq(action_id)),
        )
        .execute(conn)
        .await?;

        let Some(target) = ActionStatus::from_str(&change.target_status) else {
            tracing::warn!(
                "dropping deferred change with unknown status {:?}",
                change.target_status
            );
            continue;
        };

        let req = TransitionRequest {
            file_id,
            action_id,
            target,
            actor: ActorContext {
                user: change.requested_by.clone(),
                machine: machine.to_string(),
                worker_id: None,
            },
            opts: TransitionOptions {
                exception: change.exception.clone(),
                comment: Some("deferred status change replayed".to_string()),
                ..Default::default()
            },
            kind: TransitionKind::DeferredReplay,
        };
        apply(conn, &req).await?;
        applied += 1;
        // Anything queued while the replay ran is picked up next iteration.
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiebreak_is_non_negative() {
        for _ in 0..256 {
            assert!(random_tiebreak() >= 0);
        }
    }

    #[test]
    fn test_tiebreak_varies() {
        let values: std::collections::HashSet<i32> = (0..64).map(|_| random_tiebreak()).collect();
        assert!(values.len() > 1);
    }

    #[test]
    fn test_default_options() {
        let opts = TransitionOptions::default();
        assert!(!opts.allow_override);
        assert!(!opts.allow_reclaim_own_skip);
        assert!(opts.exception.is_none());
        assert!(opts.fallback_status.is_none());
    }
}
