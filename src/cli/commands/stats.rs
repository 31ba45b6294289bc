//! Statistics command.

use console::style;

use crate::config::Settings;
use crate::models::{ActionStatus, StatusCounts};

use super::super::helpers::format_bytes;

/// Show consolidated statistics for an action.
pub async fn cmd_stats(
    settings: &Settings,
    action: String,
    workflow: Option<String>,
    refresh: bool,
    json: bool,
) -> anyhow::Result<()> {
    let ctx = super::context(settings);
    let queue = ctx.queue();

    let act = queue.find_action(&action, workflow.as_deref()).await?;
    let stats = ctx.stats().get_statistics(act.id, refresh).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", style(&action).cyan().bold());
    for status in ActionStatus::counted() {
        if let Some(bucket) = stats.bucket(status) {
            print_bucket(status.as_str(), bucket);
        }
    }
    print_bucket("invisible", &stats.invisible);

    if let Some(at) = stats.consolidated_at {
        println!(
            "{}",
            style(format!("consolidated {}", at.format("%Y-%m-%d %H:%M:%S"))).dim()
        );
    }
    Ok(())
}

fn print_bucket(name: &str, bucket: &StatusCounts) {
    println!(
        "  {:<12} {:>8} docs {:>10} pages {:>12}",
        name,
        bucket.documents,
        bucket.pages,
        format_bytes(bucket.bytes.max(0) as u64)
    );
}
