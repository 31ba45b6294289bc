//! Long-running services built on the repositories.

mod worker;

pub use worker::{CommandProcessor, FileProcessor, ProcessDisposition, WorkerConfig, WorkerService, WorkerSummary};
