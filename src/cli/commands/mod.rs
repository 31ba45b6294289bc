//! CLI command implementations.

pub mod claim;
pub mod init;
pub mod queue;
pub mod sessions;
pub mod stats;
pub mod worker;

use crate::config::Settings;
use crate::repository::DbContext;

/// Build a database context from settings.
pub(crate) fn context(settings: &Settings) -> DbContext {
    DbContext::with_tuning(&settings.database_path, settings.tuning())
}
