//! Queue-facing file models.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ActionStatus;

/// A file known to the queue.
///
/// One row per unique path. Size and page count are recorded when the file is
/// first enqueued and only change if the file is re-enqueued from
/// `Unattempted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedFile {
    /// Database row ID.
    pub id: i32,
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Page count, zero when unknown.
    pub pages: u32,
    /// Default claim priority for this file.
    pub priority: i32,
    /// When the file was first enqueued.
    pub added_at: DateTime<Utc>,
}

/// File metadata handed to a worker by a successful claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimedFile {
    pub file_id: i32,
    pub path: PathBuf,
    pub size: u64,
    pub pages: u32,
    pub priority: i32,
}

/// Result of an enqueue request.
#[derive(Debug, Clone)]
pub struct EnqueueOutcome {
    pub file_id: i32,
    /// Whether the path was already known to the queue.
    pub already_existed: bool,
    /// Status of the file/action pair before this enqueue was applied.
    pub previous_status: ActionStatus,
}

/// One row of the append-only transition audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransition {
    pub file_id: i32,
    pub action_id: i32,
    pub from_status: ActionStatus,
    pub to_status: ActionStatus,
    pub changed_at: DateTime<Utc>,
    pub user: String,
    pub machine: String,
    pub exception: Option<String>,
    pub comment: Option<String>,
}
