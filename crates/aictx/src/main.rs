//! aictx - snapshot and roll back delegated AI coding tasks.
//!
//! This is the main entry point for the aictx CLI.

mod commands;
mod config;

use aictx_snapshot::RollbackManager;
use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::{
    handle_cleanup, handle_create, handle_delete, handle_diff, handle_history, handle_list,
    handle_rollback, init_logging, Prompt, RollbackOptions,
};
use config::Config;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser)]
#[command(name = "aictx")]
#[command(author, version, about = "Snapshot and roll back delegated AI coding tasks", long_about = None)]
struct Cli {
    /// Project root directory (default: current directory)
    #[arg(short, long, global = true, value_name = "PATH")]
    project_root: Option<PathBuf>,

    /// Skip confirmation prompts
    #[arg(short, long, global = true)]
    yes: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Subcommand (defaults to `list`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all snapshots
    List,
    /// Take a snapshot before running a task
    Create {
        /// Task description
        description: String,
        /// Task identifier (generated when omitted)
        #[arg(long)]
        task_id: Option<String>,
        /// Agent the task is delegated to
        #[arg(long, default_value = "manual")]
        agent: String,
        /// Files the task is expected to touch (default: repository status)
        #[arg(short, long, num_args = 1..)]
        files: Vec<String>,
    },
    /// Roll back to a snapshot
    Rollback {
        /// Snapshot ID (the latest snapshot when omitted)
        id: Option<String>,
        /// Roll back to the most recent snapshot
        #[arg(long, conflicts_with = "id")]
        latest: bool,
        /// Restore only these files
        #[arg(short, long, num_args = 1..)]
        files: Vec<String>,
        /// Show what would be done without making changes
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
    /// Show changes between a snapshot and the working tree
    Diff {
        /// Snapshot ID
        id: String,
    },
    /// Delete a snapshot
    Delete {
        /// Snapshot ID
        id: String,
    },
    /// Remove old snapshots, keeping only the most recent
    Cleanup {
        /// Number of snapshots to keep (default: keep_count from config)
        count: Option<usize>,
    },
    /// Show the audit trail of snapshot actions
    History,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let project_root = match cli.project_root {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    if !project_root.is_dir() {
        anyhow::bail!("Project root is not a directory: {}", project_root.display());
    }

    let (config, sources) = Config::load(&project_root).context("Failed to load configuration")?;

    let log_file = init_logging(cli.verbose, config.log_level.as_deref());
    debug!(
        project_root = %project_root.display(),
        log_file = ?log_file,
        config_sources = ?sources,
        "Starting aictx"
    );

    let manager = RollbackManager::open(&project_root, config.snapshot.clone())
        .with_context(|| format!("Failed to open snapshot storage in {}", project_root.display()))?;
    let prompt = Prompt::new(cli.yes);

    match cli.command.unwrap_or(Commands::List) {
        Commands::List => handle_list(&manager),
        Commands::Create {
            description,
            task_id,
            agent,
            files,
        } => handle_create(&manager, &description, task_id, &agent, &files),
        Commands::Rollback {
            id,
            latest: _,
            files,
            dry_run,
        } => handle_rollback(&manager, RollbackOptions { id, files, dry_run }, &prompt),
        Commands::Diff { id } => handle_diff(&manager, &id),
        Commands::Delete { id } => handle_delete(&manager, &id, &prompt),
        Commands::Cleanup { count } => {
            handle_cleanup(&manager, count.unwrap_or(config.snapshot.keep_count), &prompt)
        }
        Commands::History => handle_history(&manager),
    }
}
