//! Statistics accumulation and consolidation.
//!
//! Transitions never touch the aggregate row directly; they append signed
//! delta rows, which keeps concurrent workers off a single hot row. Reads
//! merge outstanding deltas into the aggregate and may reuse a recent
//! consolidation instead of re-merging on every call.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use crate::models::{ActionStats, ActionStatus};
use crate::schema::{
    action_stats, action_stats_deltas, actions, file_action_status, files, workflow_files,
};

use super::records::{
    ActionStatsDeltaRecord, ActionStatsRecord, FileRecord, NewActionStats, NewActionStatsDelta,
    NewWorkflowFile, WorkflowFileRecord,
};
use super::retry::with_retry;
use super::{parse_datetime_opt, AsyncSqlitePool, QueueError, Result, SqliteConn};

/// Delta bucket for files hidden from their workflow.
pub(crate) const INVISIBLE_BUCKET: &str = "invisible";

/// Append the delta pair for a status transition.
///
/// Documents/pages/bytes move out of `from`'s bucket and into `to`'s;
/// `Unattempted` has no bucket, so edges touching it write a single row.
pub(crate) async fn push_transition_delta(
    conn: &mut SqliteConn,
    action_id: i32,
    from: ActionStatus,
    to: ActionStatus,
    bytes: i64,
    pages: i64,
) -> Result<()> {
    if from.is_counted() {
        push_delta(conn, action_id, from.as_str(), -1, -pages, -bytes).await?;
    }
    if to.is_counted() {
        push_delta(conn, action_id, to.as_str(), 1, pages, bytes).await?;
    }
    Ok(())
}

/// Append one signed delta row.
pub(crate) async fn push_delta(
    conn: &mut SqliteConn,
    action_id: i32,
    bucket: &str,
    documents: i64,
    pages: i64,
    bytes: i64,
) -> Result<()> {
    diesel::insert_into(action_stats_deltas::table)
        .values(&NewActionStatsDelta {
            action_id,
            status: bucket,
            documents,
            pages,
            bytes,
        })
        .execute(conn)
        .await?;
    Ok(())
}

/// Repository for per-action aggregate statistics.
#[derive(Clone)]
pub struct StatsRepository {
    pool: AsyncSqlitePool,
    staleness_secs: i64,
    retry_attempts: u32,
}

impl StatsRepository {
    pub(crate) fn new(pool: AsyncSqlitePool, staleness_secs: i64, retry_attempts: u32) -> Self {
        Self {
            pool,
            staleness_secs,
            retry_attempts,
        }
    }

    /// Read consolidated statistics for an action.
    ///
    /// With `force_refresh` false a consolidation newer than the staleness
    /// window is returned as-is, trading a small staleness window for fewer
    /// writes to the aggregate row.
    pub async fn get_statistics(&self, action_id: i32, force_refresh: bool) -> Result<ActionStats> {
        with_retry(self.retry_attempts, "read statistics", || {
            self.get_statistics_inner(action_id, force_refresh)
        })
        .await
    }

    async fn get_statistics_inner(&self, action_id: i32, force_refresh: bool) -> Result<ActionStats> {
        let mut conn = self.pool.get().await?;
        let staleness_secs = self.staleness_secs;
        conn.transaction::<ActionStats, QueueError, _>(|conn| {
            Box::pin(async move {
                let known: Option<i32> = actions::table
                    .find(action_id)
                    .select(actions::id)
                    .first(conn)
                    .await
                    .optional()?;
                if known.is_none() {
                    return Err(QueueError::NotFound(format!("action {action_id}")));
                }

                let row: Option<ActionStatsRecord> = action_stats::table
                    .find(action_id)
                    .first(conn)
                    .await
                    .optional()?;

                let mut stats = row.as_ref().map(stats_from_record).unwrap_or_default();
                let mut last_delta_id = row.as_ref().map(|r| r.last_delta_id).unwrap_or(0);

                if !force_refresh {
                    if let Some(at) = stats.consolidated_at {
                        if (Utc::now() - at).num_seconds() < staleness_secs {
                            return Ok(stats);
                        }
                    }
                }

                let deltas: Vec<ActionStatsDeltaRecord> = action_stats_deltas::table
                    .filter(action_stats_deltas::action_id.eq(action_id))
                    .order(action_stats_deltas::id.asc())
                    .load(conn)
                    .await?;

                for delta in &deltas {
                    last_delta_id = last_delta_id.max(delta.id);
                    if delta.status == INVISIBLE_BUCKET {
                        stats
                            .invisible
                            .apply(delta.documents, delta.pages, delta.bytes);
                    } else if let Some(status) = ActionStatus::from_str(&delta.status) {
                        if let Some(bucket) = stats.bucket_mut(status) {
                            bucket.apply(delta.documents, delta.pages, delta.bytes);
                        }
                    } else {
                        tracing::warn!("ignoring statistics delta with unknown bucket {:?}", delta.status);
                    }
                }

                stats.consolidated_at = Some(Utc::now());

                diesel::replace_into(action_stats::table)
                    .values(&record_from_stats(action_id, &stats, last_delta_id))
                    .execute(conn)
                    .await?;

                if !deltas.is_empty() {
                    diesel::delete(
                        action_stats_deltas::table
                            .filter(action_stats_deltas::action_id.eq(action_id))
                            .filter(action_stats_deltas::id.le(last_delta_id)),
                    )
                    .execute(conn)
                    .await?;
                }

                Ok(stats)
            })
        })
        .await
    }

    /// Hide a file from its workflow's statistics without changing its status.
    ///
    /// The file's current-status counts move from the visible bucket to the
    /// invisible bucket. Returns false if the file was already invisible.
    pub async fn mark_invisible(
        &self,
        workflow_id: i32,
        file_id: i32,
        action_id: i32,
    ) -> Result<bool> {
        with_retry(self.retry_attempts, "mark file invisible", || {
            self.mark_invisible_inner(workflow_id, file_id, action_id)
        })
        .await
    }

    async fn mark_invisible_inner(
        &self,
        workflow_id: i32,
        file_id: i32,
        action_id: i32,
    ) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        conn.transaction::<bool, QueueError, _>(|conn| {
            Box::pin(async move {
                let membership: Option<WorkflowFileRecord> = workflow_files::table
                    .filter(workflow_files::workflow_id.eq(workflow_id))
                    .filter(workflow_files::file_id.eq(file_id))
                    .first(conn)
                    .await
                    .optional()?;

                match membership {
                    Some(row) if row.invisible != 0 => return Ok(false),
                    Some(row) => {
                        diesel::update(workflow_files::table.find(row.id))
                            .set(workflow_files::invisible.eq(1))
                            .execute(conn)
                            .await?;
                    }
                    None => {
                        diesel::insert_into(workflow_files::table)
                            .values(&NewWorkflowFile {
                                workflow_id,
                                file_id,
                                invisible: 1,
                            })
                            .execute(conn)
                            .await?;
                    }
                }

                let file: FileRecord = files::table
                    .find(file_id)
                    .first(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| QueueError::NotFound(format!("file {file_id}")))?;

                let status: Option<String> = file_action_status::table
                    .filter(file_action_status::file_id.eq(file_id))
                    .filter(file_action_status::action_id.eq(action_id))
                    .select(file_action_status::status)
                    .first(conn)
                    .await
                    .optional()?;

                let status = status
                    .as_deref()
                    .and_then(ActionStatus::from_str)
                    .unwrap_or(ActionStatus::Unattempted);

                if status.is_counted() {
                    let pages = file.page_count as i64;
                    push_delta(conn, action_id, status.as_str(), -1, -pages, -file.file_size)
                        .await?;
                    push_delta(conn, action_id, INVISIBLE_BUCKET, 1, pages, file.file_size)
                        .await?;
                }

                Ok(true)
            })
        })
        .await
    }
}

/// Map a database row to the domain aggregate.
fn stats_from_record(r: &ActionStatsRecord) -> ActionStats {
    let mut stats = ActionStats::default();
    stats.pending.apply(r.pending_documents, r.pending_pages, r.pending_bytes);
    stats
        .processing
        .apply(r.processing_documents, r.processing_pages, r.processing_bytes);
    stats
        .complete
        .apply(r.complete_documents, r.complete_pages, r.complete_bytes);
    stats.failed.apply(r.failed_documents, r.failed_pages, r.failed_bytes);
    stats
        .skipped
        .apply(r.skipped_documents, r.skipped_pages, r.skipped_bytes);
    stats
        .invisible
        .apply(r.invisible_documents, r.invisible_pages, r.invisible_bytes);
    stats.consolidated_at = parse_datetime_opt(r.consolidated_at.clone());
    stats
}

/// Map the domain aggregate back to an upsert row.
fn record_from_stats(action_id: i32, stats: &ActionStats, last_delta_id: i64) -> NewActionStats {
    NewActionStats {
        action_id,
        pending_documents: stats.pending.documents,
        pending_pages: stats.pending.pages,
        pending_bytes: stats.pending.bytes,
        processing_documents: stats.processing.documents,
        processing_pages: stats.processing.pages,
        processing_bytes: stats.processing.bytes,
        complete_documents: stats.complete.documents,
        complete_pages: stats.complete.pages,
        complete_bytes: stats.complete.bytes,
        failed_documents: stats.failed.documents,
        failed_pages: stats.failed.pages,
        failed_bytes: stats.failed.bytes,
        skipped_documents: stats.skipped.documents,
        skipped_pages: stats.skipped.pages,
        skipped_bytes: stats.skipped.bytes,
        invisible_documents: stats.invisible.documents,
        invisible_pages: stats.invisible.pages,
        invisible_bytes: stats.invisible.bytes,
        last_delta_id,
        consolidated_at: stats.consolidated_at.map(|t| t.to_rfc3339()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_record(action_id: i32) -> ActionStatsRecord {
        ActionStatsRecord {
            action_id,
            pending_documents: 0,
            pending_pages: 0,
            pending_bytes: 0,
            processing_documents: 0,
            processing_pages: 0,
            processing_bytes: 0,
            complete_documents: 0,
            complete_pages: 0,
            complete_bytes: 0,
            failed_documents: 0,
            failed_pages: 0,
            failed_bytes: 0,
            skipped_documents: 0,
            skipped_pages: 0,
            skipped_bytes: 0,
            invisible_documents: 0,
            invisible_pages: 0,
            invisible_bytes: 0,
            last_delta_id: 0,
            consolidated_at: None,
        }
    }

    #[test]
    fn test_record_roundtrip() {
        let mut record = zero_record(3);
        record.pending_documents = 4;
        record.pending_pages = 40;
        record.pending_bytes = 4000;
        record.invisible_documents = 1;
        record.consolidated_at = Some(Utc::now().to_rfc3339());

        let stats = stats_from_record(&record);
        assert_eq!(stats.pending.documents, 4);
        assert_eq!(stats.pending.pages, 40);
        assert_eq!(stats.invisible.documents, 1);
        assert!(stats.consolidated_at.is_some());

        let back = record_from_stats(3, &stats, 17);
        assert_eq!(back.pending_documents, 4);
        assert_eq!(back.invisible_documents, 1);
        assert_eq!(back.last_delta_id, 17);
    }
}
