//! Rollback and diff command handlers.

use super::prompt::Prompt;
use super::snapshot::{find_snapshot, print_diff, print_header, print_snapshot};
use aictx_snapshot::{RollbackManager, Snapshot, SnapshotId};
use anyhow::Context;
use std::process::ExitCode;

/// Number of ids suggested when a rollback target does not exist.
const SUGGESTED_IDS: usize = 5;

/// Options of the `rollback` subcommand.
#[derive(Debug, Clone, Default)]
pub struct RollbackOptions {
    /// Target snapshot; the latest one when absent.
    pub id: Option<String>,
    pub files: Vec<String>,
    pub dry_run: bool,
}

pub fn handle_rollback(
    manager: &RollbackManager,
    options: RollbackOptions,
    prompt: &Prompt,
) -> anyhow::Result<ExitCode> {
    let files = (!options.files.is_empty()).then_some(options.files.as_slice());

    let snapshot = match &options.id {
        Some(id) => {
            let id = SnapshotId::from(id.as_str());
            match find_snapshot(manager, &id)? {
                Some(snapshot) => {
                    print_header(&format!("Rolling Back to: {id}"));
                    snapshot
                }
                None => {
                    report_missing(manager, &id)?;
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        None => match manager.latest_snapshot().context("Failed to list snapshots")? {
            Some(snapshot) => {
                print_header("Rolling Back to Latest Snapshot");
                snapshot
            }
            None => {
                eprintln!("No snapshots available for rollback.");
                return Ok(ExitCode::FAILURE);
            }
        },
    };
    print_snapshot(&snapshot, None);

    if let Some(files) = files {
        println!("Selective rollback for {} files:", files.len());
        for file in files {
            println!("  - {file}");
        }
        println!();
    }

    if options.dry_run {
        println!("Dry run mode - no changes made.");
        return Ok(ExitCode::SUCCESS);
    }

    // Show what rolling back to the latest snapshot discards
    if options.id.is_none() {
        show_pending_changes(manager, &snapshot);
    }

    if !prompt.confirm("Proceed with rollback?")? {
        println!("Rollback cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    let restored = manager
        .rollback(&snapshot.id, files)
        .with_context(|| format!("Failed to roll back to {}", snapshot.id))?;

    if restored {
        println!("Successfully rolled back to: {}", snapshot.id);
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!(
            "Failed to roll back to: {} (snapshot has nothing to restore)",
            snapshot.id
        );
        Ok(ExitCode::FAILURE)
    }
}

pub fn handle_diff(manager: &RollbackManager, id: &str) -> anyhow::Result<ExitCode> {
    let id = SnapshotId::from(id);
    let Some(snapshot) = find_snapshot(manager, &id)? else {
        eprintln!("Snapshot not found: {id}");
        return Ok(ExitCode::FAILURE);
    };

    print_header(&format!("Diff for: {id}"));
    print_snapshot(&snapshot, None);

    let diff = manager
        .diff(&id)
        .with_context(|| format!("Failed to compute diff for {id}"))?;
    print_diff(&diff, manager.config().diff_preview_lines);

    Ok(ExitCode::SUCCESS)
}

fn show_pending_changes(manager: &RollbackManager, snapshot: &Snapshot) {
    match manager.diff(&snapshot.id) {
        Ok(diff) => {
            println!("Changes that will be reverted:");
            print_diff(&diff, manager.config().diff_preview_lines);
            println!();
        }
        Err(e) => tracing::warn!(snapshot_id = %snapshot.id, error = %e, "Failed to compute diff"),
    }
}

fn report_missing(manager: &RollbackManager, id: &SnapshotId) -> anyhow::Result<()> {
    eprintln!("Snapshot not found: {id}");

    let available = manager.list_snapshots().context("Failed to list snapshots")?;
    if !available.is_empty() {
        eprintln!();
        eprintln!("Available snapshots:");
        for snapshot in available.iter().take(SUGGESTED_IDS) {
            eprintln!("  - {}", snapshot.id);
        }
    }
    Ok(())
}
