//! docqueue - shared-store file/action queue for document processing pipelines.
//!
//! Independent worker processes claim files to process for a named pipeline
//! step ("action") and report success, failure, or skip. All coordination -
//! claiming under contention, lease ownership, crash recovery, statistics -
//! happens through SQLite table state and transactions; workers never talk to
//! each other directly.

pub mod cli;
pub mod config;
pub mod models;
pub mod repository;
pub mod schema;
pub mod services;
