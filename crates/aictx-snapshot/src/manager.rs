//! Snapshot orchestration: the public create/rollback API.

use crate::archive::{FileBackupBackend, BACKUP_FILE};
use crate::diff::{DiffEngine, DiffResult};
use crate::git::GitStashBackend;
use crate::history::{HistoryAction, HistoryEntry, HistoryLog};
use crate::mode::{select_mode, RepoState};
use crate::retention::RetentionPolicy;
use crate::store::SnapshotStore;
use crate::{Snapshot, SnapshotConfig, SnapshotError, SnapshotId, SnapshotMode, SnapshotResult};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Checkpoints a project before delegated tasks and rolls it back later.
///
/// Every operation works on the explicit project root given at
/// construction; the process working directory is never consulted.
#[derive(Debug)]
pub struct RollbackManager {
    project_root: PathBuf,
    config: SnapshotConfig,
    store: SnapshotStore,
    git: GitStashBackend,
    files: FileBackupBackend,
    diff_engine: DiffEngine,
    history: HistoryLog,
}

impl RollbackManager {
    /// Open the snapshot storage of `project_root`, creating it if needed.
    ///
    /// Stash captures interrupted by a crash are finished here.
    pub fn open(project_root: impl Into<PathBuf>, config: SnapshotConfig) -> SnapshotResult<Self> {
        let project_root = project_root.into();
        let store = SnapshotStore::open(config.storage_path(&project_root))?;
        let history = HistoryLog::new(&store.logs_dir());

        let manager = Self {
            git: GitStashBackend::new(&project_root),
            files: FileBackupBackend::new(&project_root),
            diff_engine: DiffEngine::new(&project_root),
            project_root,
            config,
            store,
            history,
        };
        manager.recover_interrupted();

        Ok(manager)
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Take a snapshot before a task runs.
    ///
    /// `files` is the list of paths the task is expected to touch; when it
    /// is absent or empty the repository status is recorded instead.
    /// Absolute paths under the project root are made relative, and paths
    /// outside it are skipped. A failed stash capture falls back to a file
    /// backup, so this only fails when storage itself cannot be written.
    pub fn create_snapshot(
        &self,
        task_id: &str,
        task_description: &str,
        agent: &str,
        files: Option<&[String]>,
    ) -> SnapshotResult<Snapshot> {
        let created_at = Utc::now();
        let state = self.git.repo_state();
        let selected = select_mode(&state);

        let files_modified = match files {
            Some(files) if !files.is_empty() => self.project_files(files),
            _ => self.changed_files(&state),
        };

        let id = self.store.allocate(created_at)?;
        let snapshot_dir = self.store.snapshot_dir(&id);

        let capture = self.capture(
            &id,
            &snapshot_dir,
            selected,
            &state,
            &files_modified,
            task_id,
            task_description,
        );
        let (mode, git_ref, backup_path) = match capture {
            Ok(artifacts) => artifacts,
            Err(e) => {
                // Leave an interrupted stash capture for recovery on next open
                if !GitStashBackend::has_pending(&snapshot_dir) {
                    self.discard(&id);
                }
                return Err(e);
            }
        };

        let snapshot = Snapshot {
            id,
            created_at,
            task_id: task_id.to_string(),
            task_description: task_description.to_string(),
            agent: agent.to_string(),
            mode,
            files_modified,
            git_ref,
            backup_path: backup_path.map(|path| self.display_path(&path)),
        };

        if let Err(e) = self.store.persist(&snapshot) {
            self.discard(&snapshot.id);
            return Err(e);
        }

        info!(
            snapshot_id = %snapshot.id,
            task_id = %task_id,
            agent = %agent,
            mode = %snapshot.mode,
            files = snapshot.files_modified.len(),
            "Created snapshot"
        );

        self.record(
            HistoryAction::Create,
            &snapshot.id,
            json!({
                "task_id": task_id,
                "mode": snapshot.mode,
                "files_count": snapshot.files_modified.len(),
            }),
        );

        if self.config.auto_cleanup {
            if let Err(e) = self.cleanup_old_snapshots(self.config.keep_count) {
                warn!(error = %e, "Automatic cleanup failed");
            }
        }

        Ok(snapshot)
    }

    /// All snapshots, newest first.
    pub fn list_snapshots(&self) -> SnapshotResult<Vec<Snapshot>> {
        self.store.list()
    }

    pub fn get_snapshot(&self, snapshot_id: &SnapshotId) -> SnapshotResult<Snapshot> {
        self.store.load(snapshot_id)
    }

    /// The most recent snapshot, if any.
    pub fn latest_snapshot(&self) -> SnapshotResult<Option<Snapshot>> {
        Ok(self.store.list()?.into_iter().next())
    }

    /// Changes between a snapshot and the current working tree.
    pub fn diff(&self, snapshot_id: &SnapshotId) -> SnapshotResult<DiffResult> {
        let snapshot = self.store.load(snapshot_id)?;
        let archive = self.archive_path(&snapshot);
        self.diff_engine.diff(&snapshot, archive.as_deref())
    }

    /// Restore the working tree from a snapshot, entirely or only `files`.
    ///
    /// Restoration follows the mode stored with the snapshot. Returns
    /// `Ok(false)` when the snapshot has no usable artifact.
    pub fn rollback(&self, snapshot_id: &SnapshotId, files: Option<&[String]>) -> SnapshotResult<bool> {
        let snapshot = self.store.load(snapshot_id)?;
        let files = files.filter(|files| !files.is_empty());

        let has_ref = snapshot.git_ref.as_deref().is_some_and(|r| !r.is_empty());
        let archive = self.archive_path(&snapshot);

        let mut restored = false;
        if snapshot.mode.uses_stash() && has_ref {
            match files {
                Some(files) => self.git.restore_paths(files),
                None => self.git.restore_all(),
            }
            .map_err(into_restore_failed)?;
            restored = true;
        }
        if snapshot.mode.uses_archive() {
            if let Some(archive) = &archive {
                self.files.restore(archive, files).map_err(into_restore_failed)?;
                restored = true;
            }
        }

        if !restored {
            warn!(snapshot_id = %snapshot_id, mode = %snapshot.mode, "Snapshot has nothing to restore");
            return Ok(false);
        }

        info!(
            snapshot_id = %snapshot_id,
            mode = %snapshot.mode,
            full = files.is_none(),
            "Rolled back to snapshot"
        );
        self.record(
            HistoryAction::Rollback,
            snapshot_id,
            json!({
                "files": files,
                "full_rollback": files.is_none(),
            }),
        );

        Ok(true)
    }

    /// Delete a snapshot. Returns `false` when it did not exist.
    pub fn delete_snapshot(&self, snapshot_id: &SnapshotId) -> SnapshotResult<bool> {
        let deleted = self.store.delete(snapshot_id)?;
        if deleted {
            self.record(HistoryAction::Delete, snapshot_id, Value::Null);
        }
        Ok(deleted)
    }

    /// Keep only the `keep_count` newest snapshots. Returns how many were
    /// deleted.
    pub fn cleanup_old_snapshots(&self, keep_count: usize) -> SnapshotResult<usize> {
        let snapshots = self.store.list()?;
        let policy = RetentionPolicy::new(keep_count);

        let mut deleted = 0;
        for snapshot in policy.select(&snapshots) {
            match self.delete_snapshot(&snapshot.id) {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => warn!(snapshot_id = %snapshot.id, error = %e, "Failed to delete old snapshot"),
            }
        }

        if deleted > 0 {
            info!(deleted, keep_count, "Cleaned up old snapshots");
        }
        Ok(deleted)
    }

    /// The audit trail, oldest first.
    pub fn history(&self) -> SnapshotResult<Vec<HistoryEntry>> {
        self.history.entries()
    }

    #[allow(clippy::too_many_arguments)]
    fn capture(
        &self,
        id: &SnapshotId,
        snapshot_dir: &Path,
        selected: SnapshotMode,
        state: &RepoState,
        files_modified: &[String],
        task_id: &str,
        task_description: &str,
    ) -> SnapshotResult<(SnapshotMode, Option<String>, Option<PathBuf>)> {
        let mut mode = selected;
        let mut git_ref = None;
        let mut backup_path = None;

        // Archive untracked files before the stash push moves them away
        if mode == SnapshotMode::Hybrid {
            let archived = self.archive_list(state, files_modified);
            backup_path = Some(self.files.capture(snapshot_dir, &archived)?);
        }

        if mode.uses_stash() {
            let description = format!("{task_id}: {task_description}");
            match self.git.capture(snapshot_dir, id, &description) {
                Ok(stash_ref) => git_ref = Some(stash_ref),
                Err(e) if GitStashBackend::has_pending(snapshot_dir) => return Err(e),
                Err(e) => {
                    warn!(
                        snapshot_id = %id,
                        error = %e,
                        "Stash capture failed, falling back to file backup"
                    );
                    mode = SnapshotMode::FileBackup;
                }
            }
        }

        if mode == SnapshotMode::FileBackup && backup_path.is_none() {
            let archived = self.archive_list(state, files_modified);
            backup_path = Some(self.files.capture(snapshot_dir, &archived)?);
        }

        Ok((mode, git_ref, backup_path))
    }

    /// Caller paths as project-relative names, without duplicates.
    fn project_files(&self, files: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        files
            .iter()
            .filter_map(|file| {
                let relative = project_relative(&self.project_root, file);
                if relative.is_none() {
                    warn!(file = %file, "Skipping path outside the project root");
                }
                relative
            })
            .filter(|file| seen.insert(file.clone()))
            .collect()
    }

    /// Repository status, or nothing outside version control.
    fn changed_files(&self, state: &RepoState) -> Vec<String> {
        if !state.is_git_repo {
            return Vec::new();
        }
        self.git.status_files().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read repository status");
            Vec::new()
        })
    }

    /// `files_modified` followed by untracked files, without duplicates.
    fn archive_list(&self, state: &RepoState, files_modified: &[String]) -> Vec<String> {
        let untracked = if state.is_git_repo {
            self.git.untracked_files().unwrap_or_else(|e| {
                warn!(error = %e, "Failed to list untracked files");
                Vec::new()
            })
        } else {
            Vec::new()
        };

        let mut seen = HashSet::new();
        files_modified
            .iter()
            .chain(untracked.iter())
            .filter(|file| seen.insert(*file))
            .cloned()
            .collect()
    }

    /// Archive of a snapshot, when its mode has one and it is on disk.
    fn archive_path(&self, snapshot: &Snapshot) -> Option<PathBuf> {
        if !snapshot.mode.uses_archive() || snapshot.backup_path.is_none() {
            return None;
        }
        let path = self.store.snapshot_dir(&snapshot.id).join(BACKUP_FILE);
        if path.is_file() {
            Some(path)
        } else {
            warn!(snapshot_id = %snapshot.id, path = %path.display(), "Snapshot archive is missing");
            None
        }
    }

    /// Path as recorded in metadata: relative to the project root when
    /// storage lives inside it.
    fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.project_root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Remove a snapshot directory that never became a valid snapshot.
    fn discard(&self, snapshot_id: &SnapshotId) {
        if let Err(e) = self.store.delete(snapshot_id) {
            warn!(snapshot_id = %snapshot_id, error = %e, "Failed to remove incomplete snapshot");
        }
    }

    /// History failures never fail the operation they describe.
    fn record(&self, action: HistoryAction, snapshot_id: &SnapshotId, details: Value) {
        if let Err(e) = self.history.append(action, snapshot_id, details) {
            warn!(action = %action, snapshot_id = %snapshot_id, error = %e, "Failed to record history");
        }
    }

    fn recover_interrupted(&self) {
        let ids = match self.store.ids() {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Failed to scan snapshots for interrupted captures");
                return;
            }
        };

        for id in ids {
            let snapshot_dir = self.store.snapshot_dir(&id);
            if !GitStashBackend::has_pending(&snapshot_dir) {
                continue;
            }

            match self.git.recover(&snapshot_dir) {
                Ok(_) => info!(snapshot_id = %id, "Recovered interrupted stash capture"),
                Err(e) => {
                    warn!(snapshot_id = %id, error = %e, "Failed to recover interrupted stash capture");
                    continue;
                }
            }

            if !self.store.has_metadata(&id) {
                debug!(snapshot_id = %id, "Removing snapshot that never received metadata");
                self.discard(&id);
            }
        }
    }
}

/// `file` relative to `root`, with `.` and `..` resolved lexically, or
/// `None` when it points outside the root or at the root itself.
fn project_relative(root: &Path, file: &str) -> Option<String> {
    let path = Path::new(file);
    let relative = if path.is_absolute() {
        match path.strip_prefix(root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => {
                let root = root.canonicalize().ok()?;
                path.strip_prefix(&root).ok()?.to_path_buf()
            }
        }
    } else {
        path.to_path_buf()
    };

    let mut parts: Vec<String> = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn into_restore_failed(error: SnapshotError) -> SnapshotError {
    match error {
        SnapshotError::RestoreFailed(_) => error,
        other => SnapshotError::restore_failed(other.to_string()),
    }
}
