//! Audit trail command handler.

use aictx_snapshot::RollbackManager;
use anyhow::Context;
use std::process::ExitCode;

pub fn handle_history(manager: &RollbackManager) -> anyhow::Result<ExitCode> {
    let entries = manager.history().context("Failed to read history")?;

    if entries.is_empty() {
        println!("No history recorded.");
        return Ok(ExitCode::SUCCESS);
    }

    println!("History:");
    println!();
    println!("{:<20} {:<10} {:<28} {}", "TIME", "ACTION", "SNAPSHOT", "DETAILS");
    println!("{}", "-".repeat(78));

    for entry in entries {
        let time = entry.timestamp.format("%Y-%m-%d %H:%M:%S");
        let details = serde_json::Value::Object(entry.details).to_string();
        println!(
            "{:<20} {:<10} {:<28} {}",
            time,
            entry.action.to_string(),
            entry.snapshot_id.as_str(),
            details
        );
    }

    Ok(ExitCode::SUCCESS)
}
