//! Worker loop service.
//!
//! A worker registers one session, refreshes its heartbeat from a background
//! task, and runs a claim/process/report loop in the foreground. Processing
//! itself sits behind the [`FileProcessor`] trait so the queue mechanics stay
//! independent of what a pipeline step actually does.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::models::{ActorContext, ClaimedFile};
use crate::repository::{ClaimOptions, DbContext};

/// What a processor decided about one file.
#[derive(Debug, Clone)]
pub enum ProcessDisposition {
    /// Processing succeeded; report the file complete.
    Complete,
    /// Processing failed; report the file failed with this detail.
    Failed(String),
    /// Decline the file; mark it skipped for this worker's user.
    Skip,
}

/// A pipeline step implementation.
#[async_trait]
pub trait FileProcessor: Send + Sync {
    async fn process(&self, file: &ClaimedFile) -> anyhow::Result<ProcessDisposition>;
}

/// Processor that runs an external command with the file path appended.
///
/// Exit status zero reports complete, anything else reports failed with the
/// captured stderr tail.
pub struct CommandProcessor {
    program: String,
    args: Vec<String>,
}

impl CommandProcessor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl FileProcessor for CommandProcessor {
    async fn process(&self, file: &ClaimedFile) -> anyhow::Result<ProcessDisposition> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&file.path)
            .output()
            .await?;

        if output.status.success() {
            Ok(ProcessDisposition::Complete)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr.lines().rev().take(5).collect::<Vec<_>>().join("; ");
            Ok(ProcessDisposition::Failed(format!(
                "{} exited with {}: {}",
                self.program, output.status, tail
            )))
        }
    }
}

/// Worker loop configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Files to claim per batch.
    pub batch_size: u32,
    /// Sleep between empty claim attempts.
    pub poll_interval: Duration,
    /// Heartbeat refresh interval; must stay well under the session timeout.
    pub heartbeat_interval: Duration,
    /// Also claim files skipped by other users.
    pub include_skipped: bool,
    /// Stop once the queue runs dry instead of polling forever.
    pub exit_when_idle: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            poll_interval: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(15),
            include_skipped: false,
            exit_when_idle: false,
        }
    }
}

/// Counters reported when the worker loop ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerSummary {
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// The claim/process/report loop for one action.
pub struct WorkerService {
    ctx: DbContext,
    config: WorkerConfig,
}

impl WorkerService {
    pub fn new(ctx: DbContext, config: WorkerConfig) -> Self {
        Self { ctx, config }
    }

    /// Run the worker until ctrl-c (or until idle, when configured).
    ///
    /// Registers a session, keeps its heartbeat fresh from a background task,
    /// and deregisters on the way out so held claims are reverted promptly
    /// rather than waiting for another worker's sweep.
    pub async fn run(
        &self,
        action_id: i32,
        processor: Arc<dyn FileProcessor>,
    ) -> anyhow::Result<WorkerSummary> {
        let sessions = self.ctx.sessions();

        let base = ActorContext::from_env();
        let session = sessions.register_worker(&base).await?;
        let actor = base.with_worker(session.id);

        let heartbeat = {
            let sessions = sessions.clone();
            let worker_id = session.id;
            let interval = self.config.heartbeat_interval;
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                // First tick fires immediately; the registration row is fresh.
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if let Err(e) = sessions.heartbeat(worker_id).await {
                        tracing::warn!("heartbeat failed: {e}");
                    }
                }
            })
        };

        let result = self.run_loop(&actor, action_id, processor).await;

        heartbeat.abort();
        if let Err(e) = sessions.deregister_worker(session.id).await {
            tracing::warn!("deregistration failed: {e}");
        }

        result
    }

    async fn run_loop(
        &self,
        actor: &ActorContext,
        action_id: i32,
        processor: Arc<dyn FileProcessor>,
    ) -> anyhow::Result<WorkerSummary> {
        let queue = self.ctx.queue();
        let opts = ClaimOptions {
            include_skipped: self.config.include_skipped,
            priority_floor: None,
        };
        let mut summary = WorkerSummary::default();

        loop {
            let batch = tokio::select! {
                batch = queue.claim_batch(actor, action_id, self.config.batch_size, opts) => batch?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("interrupt received, stopping worker");
                    break;
                }
            };

            if batch.is_empty() {
                if self.config.exit_when_idle {
                    break;
                }
                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_interval) => continue,
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("interrupt received, stopping worker");
                        break;
                    }
                }
            }

            for file in batch {
                let disposition = match processor.process(&file).await {
                    Ok(d) => d,
                    Err(e) => ProcessDisposition::Failed(e.to_string()),
                };
                match disposition {
                    ProcessDisposition::Complete => {
                        queue.report_complete(actor, file.file_id, action_id).await?;
                        summary.completed += 1;
                    }
                    ProcessDisposition::Failed(detail) => {
                        tracing::warn!("processing failed for {}: {detail}", file.path.display());
                        queue
                            .report_failed(actor, file.file_id, action_id, &detail)
                            .await?;
                        summary.failed += 1;
                    }
                    ProcessDisposition::Skip => {
                        queue
                            .set_skipped(actor, file.file_id, action_id, false)
                            .await?;
                        summary.skipped += 1;
                    }
                }
            }
        }

        Ok(summary)
    }
}
