//! Snapshot data structures.

use crate::{SnapshotError, SnapshotResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix shared by every snapshot identifier.
const ID_PREFIX: &str = "snap_";

/// Unique identifier for a snapshot: `snap_<YYYYMMDD_HHMMSS>[_<n>]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Build the base identifier for a point in time (second resolution).
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        Self(format!("{ID_PREFIX}{}", at.format("%Y%m%d_%H%M%S")))
    }

    /// Disambiguate an identifier that collides with an existing one.
    pub fn with_suffix(&self, n: u32) -> Self {
        Self(format!("{}_{n}", self.0))
    }

    /// Create a snapshot ID from a string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the ID as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reject identifiers that would escape the snapshots directory.
    pub fn validate(&self) -> SnapshotResult<()> {
        let id = self.0.as_str();
        if id.is_empty()
            || id == "."
            || id == ".."
            || id.contains('/')
            || id.contains('\\')
            || id.contains('\0')
        {
            return Err(SnapshotError::InvalidId(id.to_string()));
        }
        Ok(())
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SnapshotId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// How a snapshot captured the working tree.
///
/// Chosen once when the snapshot is created and stored with it; rollback
/// dispatches on the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotMode {
    /// A stash entry recorded by reference.
    GitStash,
    /// A tar.gz archive of the captured files.
    FileBackup,
    /// Stash for tracked changes plus an archive for untracked files.
    Hybrid,
}

impl SnapshotMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotMode::GitStash => "git_stash",
            SnapshotMode::FileBackup => "file_backup",
            SnapshotMode::Hybrid => "hybrid",
        }
    }

    /// Whether this mode records a stash reference.
    pub fn uses_stash(&self) -> bool {
        matches!(self, SnapshotMode::GitStash | SnapshotMode::Hybrid)
    }

    /// Whether this mode writes an archive.
    pub fn uses_archive(&self) -> bool {
        matches!(self, SnapshotMode::FileBackup | SnapshotMode::Hybrid)
    }
}

impl std::fmt::Display for SnapshotMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A checkpoint of the working tree taken before a task runs.
///
/// Never mutated after it is persisted; it can only be deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unique identifier for this snapshot.
    pub id: SnapshotId,

    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,

    /// Caller-supplied task identifier.
    pub task_id: String,

    /// Human-readable task description.
    pub task_description: String,

    /// Name of the agent the task was delegated to (display only).
    pub agent: String,

    /// Capture strategy.
    pub mode: SnapshotMode,

    /// Files captured at creation time (relative to the project root).
    #[serde(default)]
    pub files_modified: Vec<String>,

    /// Stash reference, when a stash capture succeeded.
    #[serde(default)]
    pub git_ref: Option<String>,

    /// Archive location, when a file backup was written.
    #[serde(default)]
    pub backup_path: Option<String>,
}

impl Snapshot {
    /// Check if this snapshot recorded a specific file.
    pub fn contains_file(&self, path: &str) -> bool {
        self.files_modified.iter().any(|f| f == path)
    }

    /// Whether the stored artifacts agree with the mode.
    pub fn is_consistent(&self) -> bool {
        let has_ref = self.git_ref.as_deref().is_some_and(|r| !r.is_empty());
        let has_backup = self.backup_path.is_some();
        match self.mode {
            SnapshotMode::GitStash => has_ref && !has_backup,
            SnapshotMode::FileBackup => has_backup && !has_ref,
            SnapshotMode::Hybrid => has_ref || has_backup,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(mode: SnapshotMode) -> Snapshot {
        Snapshot {
            id: SnapshotId::from("snap_20260203_143022"),
            created_at: Utc::now(),
            task_id: "task_1".to_string(),
            task_description: "Implement login".to_string(),
            agent: "aider".to_string(),
            mode,
            files_modified: vec!["src/main.rs".to_string()],
            git_ref: None,
            backup_path: None,
        }
    }

    #[test]
    fn test_id_from_timestamp() {
        let at = Utc.with_ymd_and_hms(2026, 2, 3, 14, 30, 22).unwrap();
        let id = SnapshotId::from_timestamp(at);
        assert_eq!(id.as_str(), "snap_20260203_143022");
        assert_eq!(id.with_suffix(2).as_str(), "snap_20260203_143022_2");
    }

    #[test]
    fn test_id_validation() {
        assert!(SnapshotId::from("snap_20260203_143022").validate().is_ok());
        assert!(SnapshotId::from("").validate().is_err());
        assert!(SnapshotId::from("..").validate().is_err());
        assert!(SnapshotId::from("../etc").validate().is_err());
        assert!(SnapshotId::from("a\\b").validate().is_err());
    }

    #[test]
    fn test_mode_serializes_snake_case() {
        let json = serde_json::to_string(&SnapshotMode::FileBackup).unwrap();
        assert_eq!(json, "\"file_backup\"");
        let mode: SnapshotMode = serde_json::from_str("\"git_stash\"").unwrap();
        assert_eq!(mode, SnapshotMode::GitStash);
        assert_eq!(SnapshotMode::Hybrid.to_string(), "hybrid");
    }

    #[test]
    fn test_metadata_field_names() {
        let mut snapshot = sample(SnapshotMode::GitStash);
        snapshot.git_ref = Some("stash@{0}".to_string());
        let value = serde_json::to_value(&snapshot).unwrap();
        for field in [
            "id",
            "created_at",
            "task_id",
            "task_description",
            "agent",
            "mode",
            "files_modified",
            "git_ref",
            "backup_path",
        ] {
            assert!(value.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(value["id"], "snap_20260203_143022");
        assert_eq!(value["mode"], "git_stash");
    }

    #[test]
    fn test_consistency() {
        let mut snapshot = sample(SnapshotMode::GitStash);
        assert!(!snapshot.is_consistent());
        snapshot.git_ref = Some("stash@{0}".to_string());
        assert!(snapshot.is_consistent());

        let mut backup = sample(SnapshotMode::FileBackup);
        backup.backup_path = Some("files.tar.gz".to_string());
        assert!(backup.is_consistent());
        backup.git_ref = Some("stash@{0}".to_string());
        assert!(!backup.is_consistent());
    }

    #[test]
    fn test_contains_file() {
        let snapshot = sample(SnapshotMode::FileBackup);
        assert!(snapshot.contains_file("src/main.rs"));
        assert!(!snapshot.contains_file("src/lib.rs"));
    }
}
