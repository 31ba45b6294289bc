//! Diesel ORM models for database tables.
//!
//! These models provide compile-time type checking for database operations.
//! Domain conversions live with the repositories that load them.

use diesel::prelude::*;

use crate::schema;

/// File record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::files)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FileRecord {
    pub id: i32,
    pub path: String,
    pub file_size: i64,
    pub page_count: i32,
    pub priority: i32,
    pub added_at: String,
}

/// New file for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::files)]
pub struct NewFile<'a> {
    pub path: &'a str,
    pub file_size: i64,
    pub page_count: i32,
    pub priority: i32,
    pub added_at: &'a str,
}

/// Workflow record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::workflows)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct WorkflowRecord {
    pub id: i32,
    pub name: String,
}

/// New workflow for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::workflows)]
pub struct NewWorkflow<'a> {
    pub name: &'a str,
}

/// Action record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::actions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ActionRecord {
    pub id: i32,
    pub name: String,
    pub workflow_id: Option<i32>,
}

/// New action for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::actions)]
pub struct NewAction<'a> {
    pub name: &'a str,
    pub workflow_id: Option<i32>,
}

/// Current status of a file/action pair.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::file_action_status)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FileActionStatusRecord {
    pub id: i32,
    pub file_id: i32,
    pub action_id: i32,
    pub status: String,
    pub priority: i32,
    pub random_tiebreak: i32,
}

/// New file/action status row for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::file_action_status)]
pub struct NewFileActionStatus<'a> {
    pub file_id: i32,
    pub action_id: i32,
    pub status: &'a str,
    pub priority: i32,
    pub random_tiebreak: i32,
}

/// Worker session record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::worker_sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct WorkerSessionRecord {
    pub id: i32,
    pub session_uuid: String,
    pub user: String,
    pub machine: String,
    pub pid: i32,
    pub started_at: String,
    pub last_heartbeat: String,
}

/// New worker session for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::worker_sessions)]
pub struct NewWorkerSession<'a> {
    pub session_uuid: &'a str,
    pub user: &'a str,
    pub machine: &'a str,
    pub pid: i32,
    pub started_at: &'a str,
    pub last_heartbeat: &'a str,
}

/// Lock ownership record; exists iff the file/action pair is Processing.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::locked_files)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LockedFileRecord {
    pub id: i32,
    pub file_id: i32,
    pub action_id: i32,
    pub worker_id: i32,
    pub status_before_lock: String,
    pub locked_at: String,
}

/// New lock record for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::locked_files)]
pub struct NewLockedFile<'a> {
    pub file_id: i32,
    pub action_id: i32,
    pub worker_id: i32,
    pub status_before_lock: &'a str,
    pub locked_at: &'a str,
}

/// Audit trail record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::status_transitions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StatusTransitionRecord {
    pub id: i64,
    pub file_id: i32,
    pub action_id: i32,
    pub from_status: String,
    pub to_status: String,
    pub changed_at: String,
    pub user: String,
    pub machine: String,
    pub exception: Option<String>,
    pub comment: Option<String>,
}

/// New audit trail row for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::status_transitions)]
pub struct NewStatusTransition<'a> {
    pub file_id: i32,
    pub action_id: i32,
    pub from_status: &'a str,
    pub to_status: &'a str,
    pub changed_at: &'a str,
    pub user: &'a str,
    pub machine: &'a str,
    pub exception: Option<&'a str>,
    pub comment: Option<&'a str>,
}

/// Consolidated statistics row for one action.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::action_stats)]
#[diesel(primary_key(action_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ActionStatsRecord {
    pub action_id: i32,
    pub pending_documents: i64,
    pub pending_pages: i64,
    pub pending_bytes: i64,
    pub processing_documents: i64,
    pub processing_pages: i64,
    pub processing_bytes: i64,
    pub complete_documents: i64,
    pub complete_pages: i64,
    pub complete_bytes: i64,
    pub failed_documents: i64,
    pub failed_pages: i64,
    pub failed_bytes: i64,
    pub skipped_documents: i64,
    pub skipped_pages: i64,
    pub skipped_bytes: i64,
    pub invisible_documents: i64,
    pub invisible_pages: i64,
    pub invisible_bytes: i64,
    pub last_delta_id: i64,
    pub consolidated_at: Option<String>,
}

/// Full statistics row for upsert after consolidation.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::action_stats)]
pub struct NewActionStats {
    pub action_id: i32,
    pub pending_documents: i64,
    pub pending_pages: i64,
    pub pending_bytes: i64,
    pub processing_documents: i64,
    pub processing_pages: i64,
    pub processing_bytes: i64,
    pub complete_documents: i64,
    pub complete_pages: i64,
    pub complete_bytes: i64,
    pub failed_documents: i64,
    pub failed_pages: i64,
    pub failed_bytes: i64,
    pub skipped_documents: i64,
    pub skipped_pages: i64,
    pub skipped_bytes: i64,
    pub invisible_documents: i64,
    pub invisible_pages: i64,
    pub invisible_bytes: i64,
    pub last_delta_id: i64,
    pub consolidated_at: Option<String>,
}

/// Incremental statistics adjustment; append-only.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::action_stats_deltas)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ActionStatsDeltaRecord {
    pub id: i64,
    pub action_id: i32,
    pub status: String,
    pub documents: i64,
    pub pages: i64,
    pub bytes: i64,
}

/// New statistics delta for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::action_stats_deltas)]
pub struct NewActionStatsDelta<'a> {
    pub action_id: i32,
    pub status: &'a str,
    pub documents: i64,
    pub pages: i64,
    pub bytes: i64,
}

/// Workflow membership / visibility marker.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::workflow_files)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct WorkflowFileRecord {
    pub id: i32,
    pub workflow_id: i32,
    pub file_id: i32,
    pub invisible: i32,
}

/// New workflow membership row for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::workflow_files)]
pub struct NewWorkflowFile {
    pub workflow_id: i32,
    pub file_id: i32,
    pub invisible: i32,
}

/// Skip ownership record; exists iff the pair is Skipped.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::skipped_files)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SkippedFileRecord {
    pub id: i32,
    pub file_id: i32,
    pub action_id: i32,
    pub skipped_by_user: String,
    pub skipped_at: String,
}

/// New skip record for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::skipped_files)]
pub struct NewSkippedFile<'a> {
    pub file_id: i32,
    pub action_id: i32,
    pub skipped_by_user: &'a str,
    pub skipped_at: &'a str,
}

/// Deferred status-change request.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::queued_status_changes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QueuedStatusChangeRecord {
    pub id: i64,
    pub file_id: i32,
    pub action_id: i32,
    pub target_status: String,
    pub exception: Option<String>,
    pub requested_by: String,
    pub requested_at: String,
}

/// New deferred status-change request for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::queued_status_changes)]
pub struct NewQueuedStatusChange<'a> {
    pub file_id: i32,
    pub action_id: i32,
    pub target_status: &'a str,
    pub exception: Option<&'a str>,
    pub requested_by: &'a str,
    pub requested_at: &'a str,
}
