//! Append-only audit trail of snapshot actions.

use crate::{SnapshotId, SnapshotResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// History file name inside the logs directory.
pub const HISTORY_FILE: &str = "rollback_history.json";

/// A state-changing operation recorded in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Create,
    Rollback,
    Delete,
}

impl std::fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HistoryAction::Create => "create",
            HistoryAction::Rollback => "rollback",
            HistoryAction::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// One record of the audit trail. Never edited once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub action: HistoryAction,
    pub snapshot_id: SnapshotId,
    #[serde(default)]
    pub details: Map<String, Value>,
}

/// JSON array of [`HistoryEntry`] records, rewritten atomically on append.
///
/// Appends from one process are serialized; separate processes can still
/// interleave and lose entries.
#[derive(Debug)]
pub struct HistoryLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl HistoryLog {
    /// History stored in `logs_dir`.
    pub fn new(logs_dir: &Path) -> Self {
        Self {
            path: logs_dir.join(HISTORY_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries, oldest first. A missing file reads as empty.
    pub fn entries(&self) -> SnapshotResult<Vec<HistoryEntry>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Record an action. `details` is stored as a map; anything other
    /// than a JSON object is stored under a `value` key.
    pub fn append(
        &self,
        action: HistoryAction,
        snapshot_id: &SnapshotId,
        details: Value,
    ) -> SnapshotResult<HistoryEntry> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut entries = match self.entries() {
            Ok(entries) => entries,
            Err(e) => {
                self.quarantine(&e.to_string())?;
                Vec::new()
            }
        };

        let details = match details {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        let entry = HistoryEntry {
            timestamp: Utc::now(),
            action,
            snapshot_id: snapshot_id.clone(),
            details,
        };
        entries.push(entry.clone());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&entries)?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &self.path)?;

        debug!(action = %action, snapshot_id = %snapshot_id, "Recorded history entry");
        Ok(entry)
    }

    /// Move an unreadable history file aside so a fresh log can start.
    ///
    /// Earlier quarantined logs are never overwritten: the first goes to
    /// `rollback_history.json.corrupt`, later ones get `.1`, `.2`, ...
    fn quarantine(&self, reason: &str) -> SnapshotResult<()> {
        let mut corrupt = self.path.with_extension("json.corrupt");
        let mut n = 0;
        while corrupt.exists() {
            n += 1;
            corrupt = self.path.with_extension(format!("json.corrupt.{n}"));
        }
        warn!(
            path = %self.path.display(),
            moved_to = %corrupt.display(),
            %reason,
            "History log is corrupt, starting a new one"
        );
        fs::rename(&self.path, &corrupt)?;
        Ok(())
    }
}
