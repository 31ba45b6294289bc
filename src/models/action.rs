//! Pipeline action models.

use serde::{Deserialize, Serialize};

/// A named pipeline step, optionally scoped to a workflow.
///
/// The (name, workflow) pair is unique: the same action name may exist once
/// globally and once per workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Database row ID.
    pub id: i32,
    /// Step name, e.g. "ocr" or "index".
    pub name: String,
    /// Workflow scope, `None` for a global action.
    pub workflow_id: Option<i32>,
}
