//! Queue management commands.

use std::path::PathBuf;

use console::style;

use crate::config::Settings;
use crate::models::{ActionStatus, ActorContext};
use crate::repository::queue::EnqueueRequest;
use crate::repository::TransitionOutcome;

use super::super::helpers::format_bytes;

/// Add a file to the queue for an action.
pub async fn cmd_add(
    settings: &Settings,
    path: PathBuf,
    action: String,
    workflow: Option<String>,
    priority: i32,
    pages: u32,
    force: bool,
) -> anyhow::Result<()> {
    let path = path.canonicalize().unwrap_or(path);
    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

    let ctx = super::context(settings);
    let queue = ctx.queue();
    let actor = ActorContext::from_env();

    let outcome = queue
        .enqueue_file(
            &actor,
            EnqueueRequest {
                path: path.clone(),
                action: action.clone(),
                workflow,
                priority,
                size,
                pages,
                force,
            },
        )
        .await?;

    let verb = if outcome.already_existed {
        "Re-queued"
    } else {
        "Queued"
    };
    println!(
        "{} {} {} for {} ({}, was {})",
        style("✓").green(),
        verb,
        path.display(),
        style(&action).cyan(),
        format_bytes(size),
        outcome.previous_status
    );
    Ok(())
}

/// Remove a pending file from the queue.
pub async fn cmd_remove(
    settings: &Settings,
    path: PathBuf,
    action: String,
    workflow: Option<String>,
) -> anyhow::Result<()> {
    let ctx = super::context(settings);
    let queue = ctx.queue();
    let actor = ActorContext::from_env();

    let act = queue.find_action(&action, workflow.as_deref()).await?;
    let outcome = queue.remove_from_queue(&actor, &path, act.id).await?;

    match outcome {
        TransitionOutcome::Applied { previous } => {
            println!(
                "{} Removed {} from {} (was {})",
                style("✓").green(),
                path.display(),
                style(&action).cyan(),
                previous
            );
        }
        TransitionOutcome::Unchanged { .. } => {
            println!(
                "{} {} was not queued for {}",
                style("!").yellow(),
                path.display(),
                action
            );
        }
        TransitionOutcome::Deferred { .. } => {
            println!(
                "{} {} is locked by a worker; removal queued for replay",
                style("!").yellow(),
                path.display()
            );
        }
    }
    Ok(())
}

/// Show per-status counts per action.
pub async fn cmd_status(
    settings: &Settings,
    action: Option<String>,
    workflow: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let ctx = super::context(settings);
    let queue = ctx.queue();

    let actions = match &action {
        Some(name) => vec![queue.find_action(name, workflow.as_deref()).await?],
        None => queue.list_actions().await?,
    };

    if actions.is_empty() {
        if json {
            println!("{{}}");
        } else {
            println!("{} No actions defined", style("!").yellow());
        }
        return Ok(());
    }

    let mut report = serde_json::Map::new();
    for act in actions {
        let summary = queue.queue_summary(act.id).await?;
        let count_for = |status: ActionStatus| {
            summary
                .iter()
                .find(|(s, _)| *s == status)
                .map(|(_, n)| *n)
                .unwrap_or(0)
        };
        if json {
            report.insert(
                act.name.clone(),
                serde_json::json!({
                    "pending": count_for(ActionStatus::Pending),
                    "processing": count_for(ActionStatus::Processing),
                    "complete": count_for(ActionStatus::Complete),
                    "failed": count_for(ActionStatus::Failed),
                    "skipped": count_for(ActionStatus::Skipped),
                }),
            );
        } else {
            println!(
                "{}: {} pending, {} processing, {} complete, {} failed, {} skipped",
                style(&act.name).cyan().bold(),
                count_for(ActionStatus::Pending),
                count_for(ActionStatus::Processing),
                count_for(ActionStatus::Complete),
                count_for(ActionStatus::Failed),
                count_for(ActionStatus::Skipped),
            );
        }
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

/// Show the audit trail for a file/action pair.
pub async fn cmd_history(
    settings: &Settings,
    path: PathBuf,
    action: String,
    workflow: Option<String>,
    limit: u32,
) -> anyhow::Result<()> {
    let ctx = super::context(settings);
    let queue = ctx.queue();

    let file = queue.find_file(&path).await?;
    let act = queue.find_action(&action, workflow.as_deref()).await?;
    let transitions = queue.recent_transitions(file.id, act.id, limit).await?;

    if transitions.is_empty() {
        println!(
            "{} No transitions recorded for {} / {}",
            style("!").yellow(),
            path.display(),
            action
        );
        return Ok(());
    }

    for t in transitions {
        let mut line = format!(
            "{} {} -> {} by {}@{}",
            t.changed_at.format("%Y-%m-%d %H:%M:%S"),
            t.from_status,
            style(t.to_status.to_string()).bold(),
            t.user,
            t.machine
        );
        if let Some(comment) = &t.comment {
            line.push_str(&format!(" ({comment})"));
        }
        if let Some(exception) = &t.exception {
            line.push_str(&format!(" [{}]", style(exception).red()));
        }
        println!("{line}");
    }
    Ok(())
}
