//! CLI entry point and argument parsing.

mod commands;
mod helpers;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "docq")]
#[command(about = "Shared-store file/action queue for document processing pipelines")]
#[command(version)]
pub struct Cli {
    /// Settings file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema
    Init,

    /// Manage the file/action queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },

    /// Claim a batch of files for inspection
    Claim {
        /// Action name
        #[arg(long)]
        action: String,
        /// Workflow scope
        #[arg(long)]
        workflow: Option<String>,
        /// Maximum files to claim
        #[arg(short, long, default_value = "10")]
        max: u32,
        /// Also claim files skipped by other users
        #[arg(long)]
        include_skipped: bool,
        /// Keep the claims instead of releasing them on exit
        #[arg(long)]
        hold: bool,
    },

    /// Report a claimed file complete
    Complete {
        path: PathBuf,
        #[arg(long)]
        action: String,
        #[arg(long)]
        workflow: Option<String>,
    },

    /// Report a claimed file failed
    Fail {
        path: PathBuf,
        #[arg(long)]
        action: String,
        #[arg(long)]
        workflow: Option<String>,
        /// Failure detail recorded in the audit trail
        #[arg(long)]
        error: String,
    },

    /// Mark a file skipped for an action
    Skip {
        path: PathBuf,
        #[arg(long)]
        action: String,
        #[arg(long)]
        workflow: Option<String>,
        /// Take over an existing skip owned by another user
        #[arg(long)]
        steal: bool,
    },

    /// Show the status of one file for an action
    Status {
        path: PathBuf,
        #[arg(long)]
        action: String,
        #[arg(long)]
        workflow: Option<String>,
        /// Sweep expired leases first if the file shows as processing
        #[arg(long)]
        recover: bool,
    },

    /// Run a worker loop for an action
    Worker {
        #[command(subcommand)]
        command: WorkerCommands,
    },

    /// Inspect and recover worker sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Show consolidated statistics for an action
    Stats {
        /// Action name
        action: String,
        #[arg(long)]
        workflow: Option<String>,
        /// Force re-consolidation instead of reusing a recent merge
        #[arg(long)]
        refresh: bool,
        /// Emit machine-readable JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum QueueCommands {
    /// Add a file to the queue for an action
    Add {
        path: PathBuf,
        #[arg(long)]
        action: String,
        #[arg(long)]
        workflow: Option<String>,
        /// Claim priority, higher first
        #[arg(short, long, default_value = "0")]
        priority: i32,
        /// Page count, when known
        #[arg(long, default_value = "0")]
        pages: u32,
        /// Re-queue even if the file already finished or was skipped
        #[arg(short, long)]
        force: bool,
    },

    /// Remove a pending file from the queue
    Remove {
        path: PathBuf,
        #[arg(long)]
        action: String,
        #[arg(long)]
        workflow: Option<String>,
    },

    /// Show per-status counts for each action
    Status {
        /// Limit to one action
        #[arg(long)]
        action: Option<String>,
        #[arg(long)]
        workflow: Option<String>,
        /// Emit machine-readable JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show the audit trail for a file/action pair
    History {
        path: PathBuf,
        #[arg(long)]
        action: String,
        #[arg(long)]
        workflow: Option<String>,
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
}

#[derive(Subcommand)]
enum WorkerCommands {
    /// Claim, process, and report files in a loop
    Run {
        /// Action name
        #[arg(long)]
        action: String,
        #[arg(long)]
        workflow: Option<String>,
        /// Command to run per file (file path is appended)
        #[arg(long)]
        exec: String,
        /// Extra arguments passed to the command before the path
        #[arg(long)]
        exec_arg: Vec<String>,
        /// Files to claim per batch (settings default when omitted)
        #[arg(short, long)]
        batch: Option<u32>,
        /// Also claim files skipped by other users
        #[arg(long)]
        include_skipped: bool,
        /// Exit once the queue runs dry instead of polling
        #[arg(long)]
        idle_exit: bool,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// List registered worker sessions
    List,

    /// Revert claims held by expired sessions
    Sweep {
        /// Override the configured heartbeat age limit, in seconds
        #[arg(long)]
        max_age: Option<i64>,
    },
}

/// Parse arguments and dispatch.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => commands::init::cmd_init(&settings).await,
        Commands::Queue { command } => match command {
            QueueCommands::Add {
                path,
                action,
                workflow,
                priority,
                pages,
                force,
            } => {
                commands::queue::cmd_add(&settings, path, action, workflow, priority, pages, force)
                    .await
            }
            QueueCommands::Remove {
                path,
                action,
                workflow,
            } => commands::queue::cmd_remove(&settings, path, action, workflow).await,
            QueueCommands::Status {
                action,
                workflow,
                json,
            } => commands::queue::cmd_status(&settings, action, workflow, json).await,
            QueueCommands::History {
                path,
                action,
                workflow,
                limit,
            } => commands::queue::cmd_history(&settings, path, action, workflow, limit).await,
        },
        Commands::Claim {
            action,
            workflow,
            max,
            include_skipped,
            hold,
        } => commands::claim::cmd_claim(&settings, action, workflow, max, include_skipped, hold).await,
        Commands::Complete {
            path,
            action,
            workflow,
        } => commands::claim::cmd_complete(&settings, path, action, workflow).await,
        Commands::Fail {
            path,
            action,
            workflow,
            error,
        } => commands::claim::cmd_fail(&settings, path, action, workflow, error).await,
        Commands::Skip {
            path,
            action,
            workflow,
            steal,
        } => commands::claim::cmd_skip(&settings, path, action, workflow, steal).await,
        Commands::Status {
            path,
            action,
            workflow,
            recover,
        } => commands::claim::cmd_status(&settings, path, action, workflow, recover).await,
        Commands::Worker { command } => match command {
            WorkerCommands::Run {
                action,
                workflow,
                exec,
                exec_arg,
                batch,
                include_skipped,
                idle_exit,
            } => {
                commands::worker::cmd_run(
                    &settings,
                    action,
                    workflow,
                    exec,
                    exec_arg,
                    batch,
                    include_skipped,
                    idle_exit,
                )
                .await
            }
        },
        Commands::Sessions { command } => match command {
            SessionCommands::List => commands::sessions::cmd_list(&settings).await,
            SessionCommands::Sweep { max_age } => {
                commands::sessions::cmd_sweep(&settings, max_age).await
            }
        },
        Commands::Stats {
            action,
            workflow,
            refresh,
            json,
        } => commands::stats::cmd_stats(&settings, action, workflow, refresh, json).await,
    }
}
