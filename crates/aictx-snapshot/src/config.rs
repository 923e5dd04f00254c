//! Snapshot engine configuration.

use crate::diff::DIFF_PREVIEW_LINES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default name of the storage directory at the project root.
pub const DEFAULT_STORAGE_DIR: &str = ".ai-context";

/// Configuration for the snapshot engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Storage directory, relative to the project root unless absolute.
    pub storage_dir: PathBuf,

    /// Number of snapshots kept by retention.
    pub keep_count: usize,

    /// Whether to apply retention after every new snapshot.
    pub auto_cleanup: bool,

    /// Number of patch lines shown before the remainder is summarized.
    pub diff_preview_lines: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            keep_count: 10,
            auto_cleanup: false,
            diff_preview_lines: DIFF_PREVIEW_LINES,
        }
    }
}

impl SnapshotConfig {
    /// Resolve the storage directory against a project root.
    pub fn storage_path(&self, project_root: &Path) -> PathBuf {
        if self.storage_dir.is_absolute() {
            self.storage_dir.clone()
        } else {
            project_root.join(&self.storage_dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SnapshotConfig::default();
        assert_eq!(config.storage_dir, PathBuf::from(".ai-context"));
        assert_eq!(config.keep_count, 10);
        assert!(!config.auto_cleanup);
        assert_eq!(config.diff_preview_lines, 50);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SnapshotConfig = serde_json::from_str(r#"{"keep_count": 3}"#).unwrap();
        assert_eq!(config.keep_count, 3);
        assert_eq!(config.diff_preview_lines, 50);
    }

    #[test]
    fn test_storage_path() {
        let config = SnapshotConfig::default();
        assert_eq!(
            config.storage_path(Path::new("/project")),
            PathBuf::from("/project/.ai-context")
        );

        let absolute = SnapshotConfig {
            storage_dir: PathBuf::from("/var/aictx"),
            ..Default::default()
        };
        assert_eq!(
            absolute.storage_path(Path::new("/project")),
            PathBuf::from("/var/aictx")
        );
    }
}
