//! Snapshot storage implementation.

use crate::{Snapshot, SnapshotError, SnapshotId, SnapshotResult};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SNAPSHOTS_DIR: &str = "snapshots";
const LOGS_DIR: &str = "logs";
const METADATA_FILE: &str = "metadata.json";
const GITIGNORE_FILE: &str = ".gitignore";

/// Ignores the whole storage directory, the marker file included, so
/// snapshots never show up as untracked files.
const GITIGNORE_CONTENT: &str = "# aictx snapshot storage\n*\n";

/// On-disk persistence for snapshot metadata and artifacts.
///
/// ```text
/// base_dir/
///   .gitignore
///   snapshots/
///     <snapshot_id>/
///       metadata.json      # Snapshot metadata
///       stash_ref.txt      # git_stash / hybrid
///       files.tar.gz       # file_backup / hybrid
///   logs/
///     rollback_history.json
/// ```
///
/// The store is the only component that creates or removes snapshot
/// directories. Backends write artifacts into the directory handed to them.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    /// Base directory for snapshot storage.
    base_dir: PathBuf,
}

impl SnapshotStore {
    /// Open (and create on first use) a store rooted at `base_dir`.
    pub fn open(base_dir: impl Into<PathBuf>) -> SnapshotResult<Self> {
        let base_dir = base_dir.into();

        fs::create_dir_all(base_dir.join(SNAPSHOTS_DIR))?;
        fs::create_dir_all(base_dir.join(LOGS_DIR))?;

        let gitignore = base_dir.join(GITIGNORE_FILE);
        if !gitignore.exists() {
            fs::write(&gitignore, GITIGNORE_CONTENT)?;
            debug!(path = %gitignore.display(), "Created storage ignore marker");
        }

        Ok(Self { base_dir })
    }

    /// Base directory of the store.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding the audit log.
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join(LOGS_DIR)
    }

    /// Get the directory for a snapshot.
    pub fn snapshot_dir(&self, snapshot_id: &SnapshotId) -> PathBuf {
        self.snapshots_root().join(snapshot_id.as_str())
    }

    /// Reserve a fresh identifier for a snapshot taken at `at` and create
    /// its directory.
    ///
    /// Ids have one-second resolution; a collision gets a numeric suffix.
    pub fn allocate(&self, at: DateTime<Utc>) -> SnapshotResult<SnapshotId> {
        fs::create_dir_all(self.snapshots_root())?;

        let base = SnapshotId::from_timestamp(at);
        let mut candidate = base.clone();
        let mut suffix = 0;
        loop {
            match fs::create_dir(self.snapshot_dir(&candidate)) {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    suffix += 1;
                    candidate = base.with_suffix(suffix);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Write a snapshot's metadata atomically.
    pub fn persist(&self, snapshot: &Snapshot) -> SnapshotResult<()> {
        snapshot.id.validate()?;

        let snapshot_dir = self.snapshot_dir(&snapshot.id);
        fs::create_dir_all(&snapshot_dir)?;

        let metadata_path = snapshot_dir.join(METADATA_FILE);
        let metadata_json = serde_json::to_string_pretty(snapshot)?;

        // Write atomically (write to temp file, then rename)
        let temp_path = metadata_path.with_extension("json.tmp");
        fs::write(&temp_path, metadata_json)?;
        fs::rename(&temp_path, &metadata_path)?;

        debug!(snapshot_id = %snapshot.id, "Persisted snapshot metadata");
        Ok(())
    }

    /// Get a snapshot by ID.
    ///
    /// Malformed metadata is reported as `NotFound`.
    pub fn load(&self, snapshot_id: &SnapshotId) -> SnapshotResult<Snapshot> {
        snapshot_id.validate()?;

        match self.read_metadata(snapshot_id) {
            Err(SnapshotError::Corrupted(reason)) => {
                warn!(snapshot_id = %snapshot_id, %reason, "Ignoring corrupt snapshot");
                Err(SnapshotError::not_found(snapshot_id.as_str()))
            }
            other => other,
        }
    }

    /// Whether a snapshot has readable metadata.
    pub fn has_metadata(&self, snapshot_id: &SnapshotId) -> bool {
        self.snapshot_dir(snapshot_id).join(METADATA_FILE).is_file()
    }

    /// List all snapshots, newest first.
    ///
    /// Unreadable entries are skipped so one corrupt snapshot never hides
    /// the others.
    pub fn list(&self) -> SnapshotResult<Vec<Snapshot>> {
        let mut snapshots = Vec::new();

        for snapshot_id in self.ids()? {
            match self.read_metadata(&snapshot_id) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(SnapshotError::NotFound(_)) => {
                    debug!(snapshot_id = %snapshot_id, "Skipping snapshot without metadata");
                }
                Err(e) => warn!(snapshot_id = %snapshot_id, error = %e, "Failed to load snapshot"),
            }
        }

        // Sort by creation time (newest first)
        snapshots.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(snapshots)
    }

    /// Identifiers of every snapshot directory, including ones that never
    /// received metadata.
    pub fn ids(&self) -> SnapshotResult<Vec<SnapshotId>> {
        let entries = match fs::read_dir(self.snapshots_root()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                ids.push(SnapshotId::from_string(
                    entry.file_name().to_string_lossy().to_string(),
                ));
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Delete a snapshot and all of its artifacts.
    ///
    /// Returns `false` when the snapshot did not exist.
    pub fn delete(&self, snapshot_id: &SnapshotId) -> SnapshotResult<bool> {
        snapshot_id.validate()?;
        let snapshot_dir = self.snapshot_dir(snapshot_id);

        if !snapshot_dir.exists() {
            return Ok(false);
        }

        fs::remove_dir_all(&snapshot_dir)?;
        info!(snapshot_id = %snapshot_id, "Deleted snapshot");

        Ok(true)
    }

    fn snapshots_root(&self) -> PathBuf {
        self.base_dir.join(SNAPSHOTS_DIR)
    }

    fn read_metadata(&self, snapshot_id: &SnapshotId) -> SnapshotResult<Snapshot> {
        let metadata_path = self.snapshot_dir(snapshot_id).join(METADATA_FILE);

        let metadata_json = match fs::read_to_string(&metadata_path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SnapshotError::not_found(snapshot_id.as_str()))
            }
            Err(e) => {
                return Err(SnapshotError::Corrupted(format!(
                    "{}: {}",
                    metadata_path.display(),
                    e
                )))
            }
        };

        serde_json::from_str(&metadata_json).map_err(|e| {
            SnapshotError::Corrupted(format!("{}: {}", metadata_path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SnapshotMode;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn setup_test() -> (TempDir, SnapshotStore) {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path().join(".ai-context")).unwrap();
        (dir, store)
    }

    fn snapshot(id: &str, created_at: DateTime<Utc>) -> Snapshot {
        Snapshot {
            id: SnapshotId::from(id),
            created_at,
            task_id: "task".to_string(),
            task_description: "Test".to_string(),
            agent: "manual".to_string(),
            mode: SnapshotMode::FileBackup,
            files_modified: vec!["a.txt".to_string()],
            git_ref: None,
            backup_path: Some("files.tar.gz".to_string()),
        }
    }

    #[test]
    fn test_open_creates_layout_and_marker() {
        let (dir, store) = setup_test();
        let base = dir.path().join(".ai-context");

        assert!(base.join("snapshots").is_dir());
        assert!(base.join("logs").is_dir());
        let marker = fs::read_to_string(base.join(".gitignore")).unwrap();
        assert!(marker.lines().any(|l| l.trim() == "*"));
        assert_eq!(store.logs_dir(), base.join("logs"));
    }

    #[test]
    fn test_open_keeps_existing_marker() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join(".ai-context");
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join(".gitignore"), "custom\n").unwrap();

        SnapshotStore::open(&base).unwrap();
        assert_eq!(fs::read_to_string(base.join(".gitignore")).unwrap(), "custom\n");
    }

    #[test]
    fn test_persist_and_load() {
        let (_dir, store) = setup_test();
        let original = snapshot("snap_20260101_000000", Utc::now());

        store.persist(&original).unwrap();
        let loaded = store.load(&original.id).unwrap();

        assert_eq!(loaded, original);
        assert!(store.has_metadata(&original.id));
        assert!(!store
            .snapshot_dir(&original.id)
            .join("metadata.json.tmp")
            .exists());
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let (_dir, store) = setup_test();
        let result = store.load(&SnapshotId::from("snap_missing"));
        assert!(matches!(result, Err(SnapshotError::NotFound(_))));
    }

    #[test]
    fn test_load_rejects_traversal() {
        let (_dir, store) = setup_test();
        let result = store.load(&SnapshotId::from("../logs"));
        assert!(matches!(result, Err(SnapshotError::InvalidId(_))));
    }

    #[test]
    fn test_list_empty_store() {
        let (_dir, store) = setup_test();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_list_newest_first() {
        let (_dir, store) = setup_test();
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        store.persist(&snapshot("snap_b", base + Duration::seconds(5))).unwrap();
        store.persist(&snapshot("snap_a", base)).unwrap();
        store.persist(&snapshot("snap_c", base + Duration::seconds(10))).unwrap();

        let ids: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|s| s.id.to_string())
            .collect();
        assert_eq!(ids, vec!["snap_c", "snap_b", "snap_a"]);
    }

    #[test]
    fn test_corrupt_metadata_is_skipped() {
        let (_dir, store) = setup_test();
        store.persist(&snapshot("snap_good", Utc::now())).unwrap();

        let bad = SnapshotId::from("snap_bad");
        fs::create_dir_all(store.snapshot_dir(&bad)).unwrap();
        fs::write(store.snapshot_dir(&bad).join("metadata.json"), "{ not json").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id.as_str(), "snap_good");

        assert!(matches!(store.load(&bad), Err(SnapshotError::NotFound(_))));
    }

    #[test]
    fn test_allocate_suffixes_collisions() {
        let (_dir, store) = setup_test();
        let at = Utc.with_ymd_and_hms(2026, 2, 3, 14, 30, 22).unwrap();

        let first = store.allocate(at).unwrap();
        let second = store.allocate(at).unwrap();
        let third = store.allocate(at).unwrap();

        assert_eq!(first.as_str(), "snap_20260203_143022");
        assert_eq!(second.as_str(), "snap_20260203_143022_1");
        assert_eq!(third.as_str(), "snap_20260203_143022_2");
        assert!(store.snapshot_dir(&third).is_dir());

        // Allocated but never persisted: not listed
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.ids().unwrap().len(), 3);
    }

    #[test]
    fn test_delete_snapshot() {
        let (_dir, store) = setup_test();
        let snap = snapshot("snap_20260101_000000", Utc::now());
        store.persist(&snap).unwrap();
        fs::write(store.snapshot_dir(&snap.id).join("files.tar.gz"), b"x").unwrap();

        assert!(store.delete(&snap.id).unwrap());
        assert!(!store.snapshot_dir(&snap.id).exists());
        assert!(!store.delete(&snap.id).unwrap());
    }
}
