//! Worker loop command.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::models::ClaimedFile;
use crate::services::{
    CommandProcessor, FileProcessor, ProcessDisposition, WorkerConfig, WorkerService,
};

/// Wraps a processor with a progress spinner.
struct ProgressProcessor {
    inner: CommandProcessor,
    bar: ProgressBar,
}

#[async_trait]
impl FileProcessor for ProgressProcessor {
    async fn process(&self, file: &ClaimedFile) -> anyhow::Result<ProcessDisposition> {
        self.bar.set_message(file.path.display().to_string());
        let result = self.inner.process(file).await;
        self.bar.inc(1);
        result
    }
}

/// Run a claim/process/report loop for an action.
#[allow(clippy::too_many_arguments)]
pub async fn cmd_run(
    settings: &Settings,
    action: String,
    workflow: Option<String>,
    exec: String,
    exec_args: Vec<String>,
    batch: Option<u32>,
    include_skipped: bool,
    idle_exit: bool,
) -> anyhow::Result<()> {
    let ctx = super::context(settings);
    let queue = ctx.queue();

    let act = queue.ensure_action(&action, workflow.as_deref()).await?;

    let config = WorkerConfig {
        batch_size: batch.unwrap_or(settings.queue.claim_batch_size),
        heartbeat_interval: settings.heartbeat_interval(),
        include_skipped,
        exit_when_idle: idle_exit,
        ..Default::default()
    };

    println!(
        "{} Worker starting for {} (batch {}, exec {:?})",
        style("→").cyan(),
        style(&action).cyan().bold(),
        config.batch_size,
        exec
    );

    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {pos} processed {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.enable_steady_tick(Duration::from_millis(120));

    let processor = Arc::new(ProgressProcessor {
        inner: CommandProcessor::new(exec, exec_args),
        bar: bar.clone(),
    });
    let service = WorkerService::new(ctx, config);
    let summary = service.run(act.id, processor).await?;
    bar.finish_and_clear();

    println!(
        "{} Worker done: {} complete, {} failed, {} skipped",
        style("✓").green(),
        summary.completed,
        summary.failed,
        summary.skipped
    );
    Ok(())
}
