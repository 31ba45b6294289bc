//! End-to-end queue behavior tests against a temporary SQLite database.
//!
//! Covers the concurrency-sensitive invariants: at-most-one-claimant,
//! transition audit completeness, lease recovery idempotence, statistics
//! conservation, skip ownership, and deferred-change replay.

use std::path::PathBuf;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tempfile::TempDir;

use docqueue::models::{ActionStatus, ActorContext, WorkerSession};
use docqueue::repository::transition::TransitionOptions;
use docqueue::repository::{
    ClaimOptions, DbContext, EnqueueRequest, QueueError, Tuning, TransitionOutcome,
};
use docqueue::schema::{locked_files, queued_status_changes, worker_sessions};

struct TestQueue {
    ctx: DbContext,
    _dir: TempDir,
}

async fn setup() -> TestQueue {
    let dir = TempDir::new().unwrap();
    let tuning = Tuning {
        sweep_min_interval_secs: 0,
        ..Default::default()
    };
    let ctx = DbContext::with_tuning(&dir.path().join("queue.sqlite"), tuning);
    ctx.init_schema().await.unwrap();
    TestQueue { ctx, _dir: dir }
}

fn actor(user: &str) -> ActorContext {
    ActorContext {
        user: user.to_string(),
        machine: "testhost".to_string(),
        worker_id: None,
    }
}

async fn enqueue(ctx: &DbContext, who: &ActorContext, path: &str, action: &str, priority: i32) -> i32 {
    ctx.queue()
        .enqueue_file(
            who,
            EnqueueRequest {
                path: PathBuf::from(path),
                action: action.to_string(),
                workflow: None,
                priority,
                size: 4096,
                pages: 4,
                force: false,
            },
        )
        .await
        .unwrap()
        .file_id
}

async fn register(ctx: &DbContext, user: &str) -> (ActorContext, WorkerSession) {
    let base = actor(user);
    let session = ctx.sessions().register_worker(&base).await.unwrap();
    (base.with_worker(session.id), session)
}

async fn backdate_heartbeat(ctx: &DbContext, worker_id: i32, secs: i64) {
    let mut conn = ctx.pool().get().await.unwrap();
    let old = (chrono::Utc::now() - chrono::Duration::seconds(secs)).to_rfc3339();
    diesel::update(worker_sessions::table.find(worker_id))
        .set(worker_sessions::last_heartbeat.eq(old))
        .execute(&mut conn)
        .await
        .unwrap();
}

async fn lock_count(ctx: &DbContext) -> i64 {
    let mut conn = ctx.pool().get().await.unwrap();
    locked_files::table
        .count()
        .get_result(&mut conn)
        .await
        .unwrap()
}

async fn deferred_count(ctx: &DbContext) -> i64 {
    let mut conn = ctx.pool().get().await.unwrap();
    queued_status_changes::table
        .count()
        .get_result(&mut conn)
        .await
        .unwrap()
}

#[tokio::test]
async fn claim_then_complete_updates_status_lock_and_stats() {
    let q = setup().await;
    let queue = q.ctx.queue();
    let user = actor("alice");

    let file_id = enqueue(&q.ctx, &user, "/docs/f.pdf", "ocr", 5).await;
    let action = queue.find_action("ocr", None).await.unwrap();
    assert_eq!(
        queue.get_status(file_id, action.id, false).await.unwrap(),
        ActionStatus::Pending
    );

    let (worker, _) = register(&q.ctx, "alice").await;
    let claimed = queue
        .claim_batch(&worker, action.id, 10, ClaimOptions::default())
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].file_id, file_id);
    assert_eq!(claimed[0].size, 4096);
    assert_eq!(
        queue.get_status(file_id, action.id, false).await.unwrap(),
        ActionStatus::Processing
    );
    assert_eq!(lock_count(&q.ctx).await, 1);

    queue.report_complete(&worker, file_id, action.id).await.unwrap();
    assert_eq!(
        queue.get_status(file_id, action.id, false).await.unwrap(),
        ActionStatus::Complete
    );
    assert_eq!(lock_count(&q.ctx).await, 0);

    let stats = q.ctx.stats().get_statistics(action.id, true).await.unwrap();
    assert_eq!(stats.complete.documents, 1);
    assert_eq!(stats.complete.pages, 4);
    assert_eq!(stats.complete.bytes, 4096);
    assert_eq!(stats.pending.documents, 0);
    assert_eq!(stats.processing.documents, 0);

    // Exactly one audit row per change, with correct from/to pairs
    let trail = queue.recent_transitions(file_id, action.id, 10).await.unwrap();
    let pairs: Vec<(ActionStatus, ActionStatus)> = trail
        .iter()
        .rev()
        .map(|t| (t.from_status, t.to_status))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (ActionStatus::Unattempted, ActionStatus::Pending),
            (ActionStatus::Pending, ActionStatus::Processing),
            (ActionStatus::Processing, ActionStatus::Complete),
        ]
    );
}

#[tokio::test]
async fn at_most_one_claimant_under_concurrent_claims() {
    let q = setup().await;
    let queue = q.ctx.queue();
    let user = actor("alice");

    let file_id = enqueue(&q.ctx, &user, "/docs/contended.pdf", "ocr", 0).await;
    let action = queue.find_action("ocr", None).await.unwrap();

    let (w1, _) = register(&q.ctx, "alice").await;
    let (w2, _) = register(&q.ctx, "bob").await;

    let (r1, r2) = tokio::join!(
        queue.claim_batch(&w1, action.id, 10, ClaimOptions::default()),
        queue.claim_batch(&w2, action.id, 10, ClaimOptions::default()),
    );
    let c1 = r1.unwrap();
    let c2 = r2.unwrap();
    assert_eq!(c1.len() + c2.len(), 1, "file claimed by exactly one worker");
    let winner = c1.as_slice().first().or(c2.as_slice().first()).unwrap();
    assert_eq!(winner.file_id, file_id);
    assert_eq!(lock_count(&q.ctx).await, 1);

    // Follow-up claims find nothing while the file stays claimed
    let again = queue
        .claim_batch(&w2, action.id, 10, ClaimOptions::default())
        .await
        .unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn claims_follow_priority_order() {
    let q = setup().await;
    let queue = q.ctx.queue();
    let user = actor("alice");

    enqueue(&q.ctx, &user, "/docs/low.pdf", "ocr", 1).await;
    enqueue(&q.ctx, &user, "/docs/high.pdf", "ocr", 9).await;
    enqueue(&q.ctx, &user, "/docs/mid.pdf", "ocr", 5).await;
    let action = queue.find_action("ocr", None).await.unwrap();

    let (worker, _) = register(&q.ctx, "alice").await;
    let claimed = queue
        .claim_batch(&worker, action.id, 2, ClaimOptions::default())
        .await
        .unwrap();
    let paths: Vec<String> = claimed
        .iter()
        .map(|f| f.path.display().to_string())
        .collect();
    assert_eq!(paths, vec!["/docs/high.pdf", "/docs/mid.pdf"]);
}

#[tokio::test]
async fn priority_floor_limits_claims() {
    let q = setup().await;
    let queue = q.ctx.queue();
    let user = actor("alice");

    enqueue(&q.ctx, &user, "/docs/low.pdf", "ocr", 1).await;
    enqueue(&q.ctx, &user, "/docs/high.pdf", "ocr", 9).await;
    let action = queue.find_action("ocr", None).await.unwrap();

    let (worker, _) = register(&q.ctx, "alice").await;
    let claimed = queue
        .claim_batch(
            &worker,
            action.id,
            10,
            ClaimOptions {
                include_skipped: false,
                priority_floor: Some(5),
            },
        )
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].path, PathBuf::from("/docs/high.pdf"));
}

#[tokio::test]
async fn expired_worker_is_swept_and_sweep_is_idempotent() {
    let q = setup().await;
    let queue = q.ctx.queue();
    let sessions = q.ctx.sessions();
    let user = actor("alice");

    let file_id = enqueue(&q.ctx, &user, "/docs/orphan.pdf", "ocr", 0).await;
    let action = queue.find_action("ocr", None).await.unwrap();

    let (w1, s1) = register(&q.ctx, "alice").await;
    queue
        .claim_batch(&w1, action.id, 10, ClaimOptions::default())
        .await
        .unwrap();
    assert_eq!(lock_count(&q.ctx).await, 1);

    // Heartbeat stops; the worker is presumed dead
    backdate_heartbeat(&q.ctx, s1.id, 1_000).await;
    let report = sessions.sweep_expired(true).await.unwrap();
    assert!(report.swept);
    assert_eq!(report.expired_sessions, 1);
    assert_eq!(report.reverted_locks, 1);

    assert_eq!(
        queue.get_status(file_id, action.id, false).await.unwrap(),
        ActionStatus::Pending
    );
    assert_eq!(lock_count(&q.ctx).await, 0);

    let trail_len = queue
        .recent_transitions(file_id, action.id, 50)
        .await
        .unwrap()
        .len();

    // Second sweep with no new expirations changes nothing
    let report = sessions.sweep_expired(true).await.unwrap();
    assert_eq!(report.expired_sessions, 0);
    assert_eq!(report.reverted_locks, 0);
    assert_eq!(
        queue
            .recent_transitions(file_id, action.id, 50)
            .await
            .unwrap()
            .len(),
        trail_len
    );

    // The file is claimable again
    let (w2, _) = register(&q.ctx, "bob").await;
    let claimed = queue
        .claim_batch(&w2, action.id, 10, ClaimOptions::default())
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].file_id, file_id);
}

#[tokio::test]
async fn skipped_claim_reverts_to_skipped_on_recovery() {
    let q = setup().await;
    let queue = q.ctx.queue();
    let user = actor("alice");

    let file_id = enqueue(&q.ctx, &user, "/docs/skiprevert.pdf", "ocr", 0).await;
    let action = queue.find_action("ocr", None).await.unwrap();

    queue.set_skipped(&user, file_id, action.id, false).await.unwrap();

    // Bob reclaims the skip, then dies
    let (bob, bob_session) = register(&q.ctx, "bob").await;
    let claimed = queue.claim_one(&bob, file_id, action.id).await.unwrap();
    assert!(claimed.is_some());

    backdate_heartbeat(&q.ctx, bob_session.id, 1_000).await;
    q.ctx.sessions().sweep_expired(true).await.unwrap();

    // Recovery restored the pre-claim status, not pending
    assert_eq!(
        queue.get_status(file_id, action.id, false).await.unwrap(),
        ActionStatus::Skipped
    );
}

#[tokio::test]
async fn deregister_reverts_held_claims() {
    let q = setup().await;
    let queue = q.ctx.queue();
    let user = actor("alice");

    let file_id = enqueue(&q.ctx, &user, "/docs/graceful.pdf", "ocr", 0).await;
    let action = queue.find_action("ocr", None).await.unwrap();

    let (worker, session) = register(&q.ctx, "alice").await;
    queue
        .claim_batch(&worker, action.id, 10, ClaimOptions::default())
        .await
        .unwrap();

    let reverted = q.ctx.sessions().deregister_worker(session.id).await.unwrap();
    assert_eq!(reverted, 1);
    assert_eq!(
        queue.get_status(file_id, action.id, false).await.unwrap(),
        ActionStatus::Pending
    );
    assert_eq!(lock_count(&q.ctx).await, 0);
    assert!(q.ctx.sessions().list_sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn skip_ownership_blocks_same_user_reclaim() {
    let q = setup().await;
    let queue = q.ctx.queue();
    let alice = actor("alice");

    let file_id = enqueue(&q.ctx, &alice, "/docs/skipped.pdf", "ocr", 0).await;
    let action = queue.find_action("ocr", None).await.unwrap();

    queue.set_skipped(&alice, file_id, action.id, false).await.unwrap();

    // Alice cannot reclaim her own skip
    let (alice_worker, _) = register(&q.ctx, "alice").await;
    let claimed = queue.claim_one(&alice_worker, file_id, action.id).await.unwrap();
    assert!(claimed.is_none());
    let batch = queue
        .claim_batch(
            &alice_worker,
            action.id,
            10,
            ClaimOptions {
                include_skipped: true,
                priority_floor: None,
            },
        )
        .await
        .unwrap();
    assert!(batch.is_empty());

    // Bob can
    let (bob_worker, _) = register(&q.ctx, "bob").await;
    let claimed = queue.claim_one(&bob_worker, file_id, action.id).await.unwrap();
    assert!(claimed.is_some());
    assert_eq!(
        queue.get_status(file_id, action.id, false).await.unwrap(),
        ActionStatus::Processing
    );
}

#[tokio::test]
async fn skip_owner_can_reclaim_with_override() {
    let q = setup().await;
    let queue = q.ctx.queue();
    let alice = actor("alice");

    let file_id = enqueue(&q.ctx, &alice, "/docs/own-skip.pdf", "ocr", 0).await;
    let action = queue.find_action("ocr", None).await.unwrap();
    queue.set_skipped(&alice, file_id, action.id, false).await.unwrap();

    let (alice_worker, _) = register(&q.ctx, "alice").await;

    // Without the override the engine rejects it outright
    let err = queue
        .set_status(
            &alice_worker,
            file_id,
            action.id,
            ActionStatus::Processing,
            TransitionOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::SkipOwned { .. }));

    let outcome = queue
        .set_status(
            &alice_worker,
            file_id,
            action.id,
            ActionStatus::Processing,
            TransitionOptions {
                allow_reclaim_own_skip: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(matches!(outcome, TransitionOutcome::Applied { .. }));
}

#[tokio::test]
async fn conflicting_change_is_deferred_then_replayed() {
    let q = setup().await;
    let queue = q.ctx.queue();
    let alice = actor("alice");

    let file_id = enqueue(&q.ctx, &alice, "/docs/contested.pdf", "ocr", 0).await;
    let action = queue.find_action("ocr", None).await.unwrap();

    let (w1, _) = register(&q.ctx, "alice").await;
    queue
        .claim_batch(&w1, action.id, 10, ClaimOptions::default())
        .await
        .unwrap();

    // A bystander reports failure while the file is locked elsewhere
    let bob = actor("bob");
    let outcome = queue
        .report_failed(&bob, file_id, action.id, "checksum mismatch")
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        TransitionOutcome::Deferred {
            current: ActionStatus::Processing
        }
    ));
    assert_eq!(
        queue.get_status(file_id, action.id, false).await.unwrap(),
        ActionStatus::Processing
    );
    assert_eq!(deferred_count(&q.ctx).await, 1);

    // Owner finishes; the deferred failure replays on top
    queue.report_complete(&w1, file_id, action.id).await.unwrap();
    assert_eq!(
        queue.get_status(file_id, action.id, false).await.unwrap(),
        ActionStatus::Failed
    );
    assert_eq!(deferred_count(&q.ctx).await, 0);

    let trail = queue.recent_transitions(file_id, action.id, 10).await.unwrap();
    let newest = &trail[0];
    assert_eq!(newest.from_status, ActionStatus::Complete);
    assert_eq!(newest.to_status, ActionStatus::Failed);
    assert_eq!(newest.user, "bob");
    assert_eq!(newest.exception.as_deref(), Some("checksum mismatch"));
}

#[tokio::test]
async fn deferred_changes_are_last_writer_wins() {
    let q = setup().await;
    let queue = q.ctx.queue();
    let alice = actor("alice");

    let file_id = enqueue(&q.ctx, &alice, "/docs/lww.pdf", "ocr", 0).await;
    let action = queue.find_action("ocr", None).await.unwrap();

    let (w1, _) = register(&q.ctx, "alice").await;
    queue
        .claim_batch(&w1, action.id, 10, ClaimOptions::default())
        .await
        .unwrap();

    let bob = actor("bob");
    let carol = actor("carol");
    queue
        .report_failed(&bob, file_id, action.id, "stale request")
        .await
        .unwrap();
    queue.set_pending(&carol, file_id, action.id).await.unwrap();
    assert_eq!(deferred_count(&q.ctx).await, 2);

    queue.report_complete(&w1, file_id, action.id).await.unwrap();

    // Only Carol's later request was replayed; Bob's was dropped
    assert_eq!(
        queue.get_status(file_id, action.id, false).await.unwrap(),
        ActionStatus::Pending
    );
    assert_eq!(deferred_count(&q.ctx).await, 0);

    let trail = queue.recent_transitions(file_id, action.id, 10).await.unwrap();
    let pairs: Vec<(ActionStatus, ActionStatus)> = trail
        .iter()
        .rev()
        .map(|t| (t.from_status, t.to_status))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (ActionStatus::Unattempted, ActionStatus::Pending),
            (ActionStatus::Pending, ActionStatus::Processing),
            (ActionStatus::Processing, ActionStatus::Complete),
            (ActionStatus::Complete, ActionStatus::Pending),
        ]
    );
}

#[tokio::test]
async fn statistics_match_row_counts_after_mixed_outcomes() {
    let q = setup().await;
    let queue = q.ctx.queue();
    let alice = actor("alice");

    let f1 = enqueue(&q.ctx, &alice, "/docs/a.pdf", "ocr", 9).await;
    let f2 = enqueue(&q.ctx, &alice, "/docs/b.pdf", "ocr", 5).await;
    let f3 = enqueue(&q.ctx, &alice, "/docs/c.pdf", "ocr", 1).await;
    let action = queue.find_action("ocr", None).await.unwrap();

    let (worker, _) = register(&q.ctx, "alice").await;
    let claimed = queue
        .claim_batch(&worker, action.id, 2, ClaimOptions::default())
        .await
        .unwrap();
    assert_eq!(
        claimed.iter().map(|f| f.file_id).collect::<Vec<_>>(),
        vec![f1, f2]
    );

    queue.report_complete(&worker, f1, action.id).await.unwrap();
    queue
        .report_failed(&worker, f2, action.id, "unreadable")
        .await
        .unwrap();
    queue.set_skipped(&alice, f3, action.id, false).await.unwrap();

    let stats = q.ctx.stats().get_statistics(action.id, true).await.unwrap();
    let summary = queue.queue_summary(action.id).await.unwrap();

    for status in ActionStatus::counted() {
        let rows = summary
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, n)| *n)
            .unwrap_or(0);
        let counted = stats.bucket(status).unwrap().documents;
        assert_eq!(counted, rows, "bucket {status} diverged from row count");
    }
    assert_eq!(stats.total_documents(), 3);
    assert_eq!(stats.total_bytes(), 3 * 4096);
}

#[tokio::test]
async fn stale_consolidation_is_reused_until_forced() {
    let q = setup().await;
    let queue = q.ctx.queue();
    let alice = actor("alice");

    let file_id = enqueue(&q.ctx, &alice, "/docs/stale.pdf", "ocr", 0).await;
    let action = queue.find_action("ocr", None).await.unwrap();

    let stats = q.ctx.stats().get_statistics(action.id, true).await.unwrap();
    assert_eq!(stats.pending.documents, 1);

    // A change lands after consolidation
    queue.set_skipped(&alice, file_id, action.id, false).await.unwrap();

    // Unforced read may return the recent consolidation
    let lazy = q.ctx.stats().get_statistics(action.id, false).await.unwrap();
    assert_eq!(lazy.pending.documents, 1);

    // Forced read merges the outstanding delta
    let fresh = q.ctx.stats().get_statistics(action.id, true).await.unwrap();
    assert_eq!(fresh.pending.documents, 0);
    assert_eq!(fresh.skipped.documents, 1);
}

#[tokio::test]
async fn invisible_files_move_between_buckets() {
    let q = setup().await;
    let queue = q.ctx.queue();
    let alice = actor("alice");

    let file_id = queue
        .enqueue_file(
            &alice,
            EnqueueRequest {
                path: PathBuf::from("/docs/hidden.pdf"),
                action: "ocr".to_string(),
                workflow: Some("intake".to_string()),
                priority: 0,
                size: 4096,
                pages: 4,
                force: false,
            },
        )
        .await
        .unwrap()
        .file_id;
    let action = queue.find_action("ocr", Some("intake")).await.unwrap();
    let workflow_id = action.workflow_id.unwrap();

    let changed = q
        .ctx
        .stats()
        .mark_invisible(workflow_id, file_id, action.id)
        .await
        .unwrap();
    assert!(changed);

    // Marking twice is a no-op
    let changed = q
        .ctx
        .stats()
        .mark_invisible(workflow_id, file_id, action.id)
        .await
        .unwrap();
    assert!(!changed);

    let stats = q.ctx.stats().get_statistics(action.id, true).await.unwrap();
    assert_eq!(stats.pending.documents, 0);
    assert_eq!(stats.invisible.documents, 1);
    assert_eq!(stats.invisible.bytes, 4096);

    // Status itself is untouched
    assert_eq!(
        queue.get_status(file_id, action.id, false).await.unwrap(),
        ActionStatus::Pending
    );
}

#[tokio::test]
async fn forced_enqueue_requeues_finished_file() {
    let q = setup().await;
    let queue = q.ctx.queue();
    let alice = actor("alice");

    let file_id = enqueue(&q.ctx, &alice, "/docs/redo.pdf", "ocr", 0).await;
    let action = queue.find_action("ocr", None).await.unwrap();

    let (worker, _) = register(&q.ctx, "alice").await;
    queue
        .claim_batch(&worker, action.id, 10, ClaimOptions::default())
        .await
        .unwrap();
    queue.report_complete(&worker, file_id, action.id).await.unwrap();

    // Plain enqueue leaves a finished file alone
    let outcome = queue
        .enqueue_file(
            &alice,
            EnqueueRequest {
                path: PathBuf::from("/docs/redo.pdf"),
                action: "ocr".to_string(),
                workflow: None,
                priority: 0,
                size: 4096,
                pages: 4,
                force: false,
            },
        )
        .await
        .unwrap();
    assert!(outcome.already_existed);
    assert_eq!(outcome.previous_status, ActionStatus::Complete);
    assert_eq!(
        queue.get_status(file_id, action.id, false).await.unwrap(),
        ActionStatus::Complete
    );

    // Forced enqueue re-queues it
    let outcome = queue
        .enqueue_file(
            &alice,
            EnqueueRequest {
                path: PathBuf::from("/docs/redo.pdf"),
                action: "ocr".to_string(),
                workflow: None,
                priority: 3,
                size: 4096,
                pages: 4,
                force: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.previous_status, ActionStatus::Complete);
    assert_eq!(
        queue.get_status(file_id, action.id, false).await.unwrap(),
        ActionStatus::Pending
    );
}

#[tokio::test]
async fn remove_from_queue_returns_file_to_unattempted() {
    let q = setup().await;
    let queue = q.ctx.queue();
    let alice = actor("alice");

    let file_id = enqueue(&q.ctx, &alice, "/docs/removed.pdf", "ocr", 0).await;
    let action = queue.find_action("ocr", None).await.unwrap();

    let outcome = queue
        .remove_from_queue(&alice, &PathBuf::from("/docs/removed.pdf"), action.id)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        TransitionOutcome::Applied {
            previous: ActionStatus::Pending
        }
    ));
    assert_eq!(
        queue.get_status(file_id, action.id, false).await.unwrap(),
        ActionStatus::Unattempted
    );

    // A completed file cannot be removed
    enqueue(&q.ctx, &alice, "/docs/removed.pdf", "ocr", 0).await;
    let (worker, _) = register(&q.ctx, "alice").await;
    queue
        .claim_batch(&worker, action.id, 10, ClaimOptions::default())
        .await
        .unwrap();
    queue.report_complete(&worker, file_id, action.id).await.unwrap();
    let err = queue
        .remove_from_queue(&alice, &PathBuf::from("/docs/removed.pdf"), action.id)
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::InvalidTransition { .. }));
}

#[tokio::test]
async fn claim_one_inserts_missing_row_and_audits_both_steps() {
    let q = setup().await;
    let queue = q.ctx.queue();
    let alice = actor("alice");

    // The file exists for "ocr" but has never been referenced for "index"
    let file_id = enqueue(&q.ctx, &alice, "/docs/single.pdf", "ocr", 0).await;
    let index = queue.ensure_action("index", None).await.unwrap();

    let (worker, _) = register(&q.ctx, "alice").await;
    let claimed = queue.claim_one(&worker, file_id, index.id).await.unwrap();
    assert!(claimed.is_some());
    assert_eq!(
        queue.get_status(file_id, index.id, false).await.unwrap(),
        ActionStatus::Processing
    );

    let trail = queue.recent_transitions(file_id, index.id, 10).await.unwrap();
    let pairs: Vec<(ActionStatus, ActionStatus)> = trail
        .iter()
        .rev()
        .map(|t| (t.from_status, t.to_status))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (ActionStatus::Unattempted, ActionStatus::Pending),
            (ActionStatus::Pending, ActionStatus::Processing),
        ]
    );

    // A second targeted claim finds nothing to take
    let (other, _) = register(&q.ctx, "bob").await;
    let reclaimed = queue.claim_one(&other, file_id, index.id).await.unwrap();
    assert!(reclaimed.is_none());
}

#[tokio::test]
async fn get_status_with_recovery_reveals_reverted_state() {
    let q = setup().await;
    let queue = q.ctx.queue();
    let alice = actor("alice");

    let file_id = enqueue(&q.ctx, &alice, "/docs/peek.pdf", "ocr", 0).await;
    let action = queue.find_action("ocr", None).await.unwrap();

    let (worker, session) = register(&q.ctx, "alice").await;
    queue
        .claim_batch(&worker, action.id, 10, ClaimOptions::default())
        .await
        .unwrap();
    backdate_heartbeat(&q.ctx, session.id, 1_000).await;

    // Plain read still sees the stale processing status
    assert_eq!(
        queue.get_status(file_id, action.id, false).await.unwrap(),
        ActionStatus::Processing
    );

    // Recovery-aware read sweeps first
    assert_eq!(
        queue.get_status(file_id, action.id, true).await.unwrap(),
        ActionStatus::Pending
    );
}

#[tokio::test]
async fn claim_requires_registered_session() {
    let q = setup().await;
    let queue = q.ctx.queue();
    let alice = actor("alice");

    enqueue(&q.ctx, &alice, "/docs/nosession.pdf", "ocr", 0).await;
    let action = queue.find_action("ocr", None).await.unwrap();

    let err = queue
        .claim_batch(&alice, action.id, 10, ClaimOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::NoWorkerSession));
}

#[tokio::test]
async fn unknown_file_and_action_are_not_found() {
    let q = setup().await;
    let queue = q.ctx.queue();

    let err = queue.get_status(999, 1, false).await.unwrap_err();
    assert!(matches!(err, QueueError::NotFound(_)));

    let err = queue.find_action("missing", None).await.unwrap_err();
    assert!(matches!(err, QueueError::NotFound(_)));

    let err = queue
        .find_file(&PathBuf::from("/docs/never-seen.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::NotFound(_)));
}
