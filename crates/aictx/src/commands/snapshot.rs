//! Snapshot management command handlers.
//!
//! Handles listing, creating, deleting and pruning snapshots.

use super::prompt::Prompt;
use aictx_snapshot::{DiffResult, RollbackManager, Snapshot, SnapshotId};
use anyhow::Context;
use chrono::Utc;
use std::process::ExitCode;

/// Number of files shown per snapshot before the rest is summarized.
const LISTED_FILES: usize = 5;

pub fn handle_list(manager: &RollbackManager) -> anyhow::Result<ExitCode> {
    let snapshots = manager.list_snapshots().context("Failed to list snapshots")?;

    if snapshots.is_empty() {
        println!("No snapshots found.");
        println!("Create one with: aictx create \"task description\"");
        return Ok(ExitCode::SUCCESS);
    }

    print_header(&format!("Available Snapshots ({})", snapshots.len()));
    for (i, snapshot) in snapshots.iter().enumerate() {
        print_snapshot(snapshot, Some(i + 1));
    }

    Ok(ExitCode::SUCCESS)
}

pub fn handle_create(
    manager: &RollbackManager,
    description: &str,
    task_id: Option<String>,
    agent: &str,
    files: &[String],
) -> anyhow::Result<ExitCode> {
    let task_id =
        task_id.unwrap_or_else(|| format!("task_{}", Utc::now().format("%Y%m%d_%H%M%S")));
    let files = (!files.is_empty()).then_some(files);

    let snapshot = manager
        .create_snapshot(&task_id, description, agent, files)
        .context("Failed to create snapshot")?;

    println!("Created snapshot: {}", snapshot.id);
    println!();
    print_snapshot(&snapshot, None);

    Ok(ExitCode::SUCCESS)
}

pub fn handle_delete(
    manager: &RollbackManager,
    id: &str,
    prompt: &Prompt,
) -> anyhow::Result<ExitCode> {
    let id = SnapshotId::from(id);
    let Some(snapshot) = find_snapshot(manager, &id)? else {
        eprintln!("Snapshot not found: {id}");
        return Ok(ExitCode::FAILURE);
    };

    print_header(&format!("Deleting Snapshot: {id}"));
    print_snapshot(&snapshot, None);

    if !prompt.confirm("Are you sure you want to delete this snapshot?")? {
        println!("Deletion cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    if manager
        .delete_snapshot(&id)
        .with_context(|| format!("Failed to delete snapshot {id}"))?
    {
        println!("Snapshot deleted: {id}");
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("Snapshot not found: {id}");
        Ok(ExitCode::FAILURE)
    }
}

pub fn handle_cleanup(
    manager: &RollbackManager,
    keep_count: usize,
    prompt: &Prompt,
) -> anyhow::Result<ExitCode> {
    let snapshots = manager.list_snapshots().context("Failed to list snapshots")?;

    if snapshots.len() <= keep_count {
        println!(
            "No cleanup needed. {} snapshots (keeping {}).",
            snapshots.len(),
            keep_count
        );
        return Ok(ExitCode::SUCCESS);
    }

    let to_delete = &snapshots[keep_count..];
    print_header(&format!("Cleanup: Removing {} Old Snapshots", to_delete.len()));
    println!("Current snapshots: {}", snapshots.len());
    println!("Keeping: {keep_count}");
    println!("To delete: {}", to_delete.len());
    println!();
    println!("Snapshots to be deleted:");
    for snapshot in to_delete {
        println!("  - {} ({})", snapshot.id, snapshot.task_description);
    }
    println!();

    if !prompt.confirm(&format!("Delete {} snapshots?", to_delete.len()))? {
        println!("Cleanup cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    let deleted = manager
        .cleanup_old_snapshots(keep_count)
        .context("Failed to clean up snapshots")?;
    println!("Deleted {deleted} snapshots.");

    Ok(ExitCode::SUCCESS)
}

/// Load a snapshot, treating "not found" as an answer rather than an error.
pub(crate) fn find_snapshot(
    manager: &RollbackManager,
    id: &SnapshotId,
) -> anyhow::Result<Option<Snapshot>> {
    match manager.get_snapshot(id) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read snapshot {id}")),
    }
}

pub(crate) fn print_header(text: &str) {
    println!();
    println!("{}", "=".repeat(60));
    println!("  {text}");
    println!("{}", "=".repeat(60));
    println!();
}

pub(crate) fn print_snapshot(snapshot: &Snapshot, index: Option<usize>) {
    match index {
        Some(index) => println!("[{index}] {}", snapshot.id),
        None => println!("{}", snapshot.id),
    }
    println!(
        "  Created: {}",
        snapshot.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  Task:    {} ({})", snapshot.task_description, snapshot.task_id);
    println!("  Agent:   {}", snapshot.agent);
    println!("  Mode:    {}", snapshot.mode);
    println!("  Files:   {} modified", snapshot.files_modified.len());
    for file in snapshot.files_modified.iter().take(LISTED_FILES) {
        println!("    - {file}");
    }
    if snapshot.files_modified.len() > LISTED_FILES {
        println!(
            "    ... and {} more",
            snapshot.files_modified.len() - LISTED_FILES
        );
    }
    println!();
}

pub(crate) fn print_diff(diff: &DiffResult, preview_lines: usize) {
    if !diff.files_added.is_empty() {
        println!("Added files:");
        for file in &diff.files_added {
            println!("  + {file}");
        }
    }
    if !diff.files_modified.is_empty() {
        println!("Modified files:");
        for file in &diff.files_modified {
            println!("  ~ {file}");
        }
    }
    if !diff.files_deleted.is_empty() {
        println!("Deleted files:");
        for file in &diff.files_deleted {
            println!("  - {file}");
        }
    }
    if diff.file_count() == 0 {
        println!("No changes detected.");
    }

    if !diff.diff_content.is_empty() {
        println!();
        println!("Diff content:");
        println!("{}", "-".repeat(40));
        let (lines, remaining) = diff.preview(preview_lines);
        for line in lines {
            println!("{line}");
        }
        if remaining > 0 {
            println!();
            println!("... ({remaining} more lines)");
        }
    }
}
