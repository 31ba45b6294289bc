//! Claim and status-report commands.

use std::path::PathBuf;

use console::style;

use crate::config::Settings;
use crate::models::ActorContext;
use crate::repository::{ClaimOptions, TransitionOutcome};

use super::super::helpers::format_bytes;

/// Claim a batch of files and print them.
///
/// Registers a short-lived worker session for the claim. Unless `--hold` is
/// given the session is deregistered on exit, which reverts the claims so the
/// files go straight back to pending.
pub async fn cmd_claim(
    settings: &Settings,
    action: String,
    workflow: Option<String>,
    max: u32,
    include_skipped: bool,
    hold: bool,
) -> anyhow::Result<()> {
    let ctx = super::context(settings);
    let queue = ctx.queue();
    let sessions = ctx.sessions();

    let act = queue.find_action(&action, workflow.as_deref()).await?;
    let base = ActorContext::from_env();
    let session = sessions.register_worker(&base).await?;
    let actor = base.with_worker(session.id);

    let claimed = queue
        .claim_batch(
            &actor,
            act.id,
            max,
            ClaimOptions {
                include_skipped,
                priority_floor: None,
            },
        )
        .await?;

    if claimed.is_empty() {
        println!("{} Nothing to claim for {}", style("!").yellow(), action);
    } else {
        for file in &claimed {
            println!(
                "{} {} (priority {}, {}, {} pages)",
                style(file.file_id).dim(),
                file.path.display(),
                file.priority,
                format_bytes(file.size),
                file.pages
            );
        }
        println!(
            "{} Claimed {} file(s) for {}",
            style("✓").green(),
            claimed.len(),
            style(&action).cyan()
        );
    }

    if hold {
        println!(
            "{} Claims held by session {}; sweep after {}s of silence reclaims them",
            style("!").yellow(),
            session.session_uuid,
            settings.queue.session_timeout_secs
        );
    } else {
        sessions.deregister_worker(session.id).await?;
    }
    Ok(())
}

/// Report a file complete.
pub async fn cmd_complete(
    settings: &Settings,
    path: PathBuf,
    action: String,
    workflow: Option<String>,
) -> anyhow::Result<()> {
    let ctx = super::context(settings);
    let queue = ctx.queue();
    let actor = ActorContext::from_env();

    let file = queue.find_file(&path).await?;
    let act = queue.find_action(&action, workflow.as_deref()).await?;
    let outcome = queue.report_complete(&actor, file.id, act.id).await?;
    print_outcome(&path, "complete", outcome);
    Ok(())
}

/// Report a file failed.
pub async fn cmd_fail(
    settings: &Settings,
    path: PathBuf,
    action: String,
    workflow: Option<String>,
    error: String,
) -> anyhow::Result<()> {
    let ctx = super::context(settings);
    let queue = ctx.queue();
    let actor = ActorContext::from_env();

    let file = queue.find_file(&path).await?;
    let act = queue.find_action(&action, workflow.as_deref()).await?;
    let outcome = queue.report_failed(&actor, file.id, act.id, &error).await?;
    print_outcome(&path, "failed", outcome);
    Ok(())
}

/// Mark a file skipped.
pub async fn cmd_skip(
    settings: &Settings,
    path: PathBuf,
    action: String,
    workflow: Option<String>,
    steal: bool,
) -> anyhow::Result<()> {
    let ctx = super::context(settings);
    let queue = ctx.queue();
    let actor = ActorContext::from_env();

    let file = queue.find_file(&path).await?;
    let act = queue.find_action(&action, workflow.as_deref()).await?;
    let outcome = queue.set_skipped(&actor, file.id, act.id, steal).await?;
    print_outcome(&path, "skipped", outcome);
    Ok(())
}

/// Show the status of one file for an action.
pub async fn cmd_status(
    settings: &Settings,
    path: PathBuf,
    action: String,
    workflow: Option<String>,
    recover: bool,
) -> anyhow::Result<()> {
    let ctx = super::context(settings);
    let queue = ctx.queue();

    let file = queue.find_file(&path).await?;
    let act = queue.find_action(&action, workflow.as_deref()).await?;
    let status = queue.get_status(file.id, act.id, recover).await?;

    println!(
        "{} is {} for {}",
        path.display(),
        style(status.to_string()).bold(),
        style(&action).cyan()
    );
    Ok(())
}

fn print_outcome(path: &std::path::Path, verb: &str, outcome: TransitionOutcome) {
    match outcome {
        TransitionOutcome::Applied { previous } => {
            println!(
                "{} Marked {} {} (was {})",
                style("✓").green(),
                path.display(),
                verb,
                previous
            );
        }
        TransitionOutcome::Unchanged { current } => {
            println!(
                "{} {} already {}",
                style("!").yellow(),
                path.display(),
                current
            );
        }
        TransitionOutcome::Deferred { current } => {
            println!(
                "{} {} is locked by a worker (still {}); change queued for replay",
                style("!").yellow(),
                path.display(),
                current
            );
        }
    }
}
