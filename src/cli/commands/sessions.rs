//! Worker session commands.

use console::style;

use crate::config::Settings;

use super::super::helpers::format_age;

/// List registered worker sessions.
pub async fn cmd_list(settings: &Settings) -> anyhow::Result<()> {
    let ctx = super::context(settings);
    let sessions = ctx.sessions().list_sessions().await?;

    if sessions.is_empty() {
        println!("{} No worker sessions registered", style("!").yellow());
        return Ok(());
    }

    let timeout = settings.queue.session_timeout_secs;
    for session in sessions {
        let age = session.heartbeat_age_secs();
        let marker = if session.is_stale(timeout) {
            style("stale").red()
        } else {
            style("alive").green()
        };
        println!(
            "{} {} {}@{} pid {} (heartbeat {} ago)",
            marker,
            style(&session.session_uuid).dim(),
            session.user,
            session.machine,
            session.pid,
            format_age(age)
        );
    }
    Ok(())
}

/// Revert claims held by expired sessions.
pub async fn cmd_sweep(settings: &Settings, max_age: Option<i64>) -> anyhow::Result<()> {
    let ctx = super::context(settings);
    let sessions = ctx.sessions();

    let report = match max_age {
        Some(age) => sessions.sweep_expired_older_than(age, true).await?,
        None => sessions.sweep_expired(true).await?,
    };

    println!(
        "{} Swept {} expired session(s): {} lock(s) reverted, {} repaired",
        style("✓").green(),
        report.expired_sessions,
        report.reverted_locks,
        report.repaired_locks
    );
    Ok(())
}
