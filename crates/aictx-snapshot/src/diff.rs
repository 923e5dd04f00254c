//! Differences between a snapshot and the current working tree.

use crate::archive::FileBackupBackend;
use crate::git::{is_git_repo, open_repository};
use crate::{Snapshot, SnapshotId, SnapshotResult};
use git2::{Delta, DiffFormat, DiffOptions, ErrorCode};
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Number of patch lines shown before the rest is summarized.
pub const DIFF_PREVIEW_LINES: usize = 50;

/// Changes between a snapshot and the current state. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub snapshot_id: SnapshotId,
    pub files_added: Vec<String>,
    pub files_modified: Vec<String>,
    pub files_deleted: Vec<String>,
    /// Textual patch, possibly empty.
    pub diff_content: String,
}

impl DiffResult {
    fn new(snapshot_id: SnapshotId) -> Self {
        Self {
            snapshot_id,
            files_added: Vec::new(),
            files_modified: Vec::new(),
            files_deleted: Vec::new(),
            diff_content: String::new(),
        }
    }

    /// Whether nothing changed at all.
    pub fn is_empty(&self) -> bool {
        self.files_added.is_empty()
            && self.files_modified.is_empty()
            && self.files_deleted.is_empty()
            && self.diff_content.is_empty()
    }

    /// Total number of files reported.
    pub fn file_count(&self) -> usize {
        self.files_added.len() + self.files_modified.len() + self.files_deleted.len()
    }

    /// First `limit` lines of the patch and the number of lines left out.
    pub fn preview(&self, limit: usize) -> (Vec<&str>, usize) {
        let lines: Vec<&str> = self.diff_content.lines().collect();
        if lines.len() <= limit {
            return (lines, 0);
        }
        let remaining = lines.len() - limit;
        (lines[..limit].to_vec(), remaining)
    }
}

/// Computes [`DiffResult`]s for snapshots of one project.
#[derive(Debug, Clone)]
pub struct DiffEngine {
    project_root: PathBuf,
}

impl DiffEngine {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    /// Diff the working tree against `snapshot`.
    ///
    /// In a repository the comparison is `HEAD` against the working tree
    /// (untracked files included). Otherwise the recorded file list is
    /// reported as modified, with a patch of `archive` members against the
    /// current files when an archive is given.
    pub fn diff(&self, snapshot: &Snapshot, archive: Option<&Path>) -> SnapshotResult<DiffResult> {
        if is_git_repo(&self.project_root) {
            self.diff_repository(snapshot)
        } else {
            self.diff_archive(snapshot, archive)
        }
    }

    fn diff_repository(&self, snapshot: &Snapshot) -> SnapshotResult<DiffResult> {
        let repo = open_repository(&self.project_root)?;

        // An unborn branch has no tree to compare against
        let head_tree = match repo.head() {
            Ok(head) => Some(head.peel_to_tree()?),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => None,
            Err(e) => return Err(e.into()),
        };

        let mut opts = DiffOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .show_untracked_content(true);

        let diff = repo.diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut opts))?;

        let mut result = DiffResult::new(snapshot.id.clone());
        for delta in diff.deltas() {
            let path = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().replace('\\', "/"));
            let Some(path) = path else { continue };

            match delta.status() {
                Delta::Added | Delta::Untracked | Delta::Copied => result.files_added.push(path),
                Delta::Deleted => result.files_deleted.push(path),
                Delta::Modified | Delta::Renamed | Delta::Typechange => {
                    result.files_modified.push(path)
                }
                _ => {}
            }
        }

        let mut patch = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                patch.push(line.origin());
            }
            patch.push_str(&String::from_utf8_lossy(line.content()));
            true
        })?;
        result.diff_content = patch;

        debug!(
            snapshot_id = %snapshot.id,
            files = result.file_count(),
            "Computed repository diff"
        );
        Ok(result)
    }

    fn diff_archive(&self, snapshot: &Snapshot, archive: Option<&Path>) -> SnapshotResult<DiffResult> {
        let mut result = DiffResult::new(snapshot.id.clone());
        result.files_modified = snapshot.files_modified.clone();

        let Some(archive) = archive.filter(|path| path.is_file()) else {
            return Ok(result);
        };

        let backend = FileBackupBackend::new(&self.project_root);
        for member in backend.read_files(archive)? {
            let current = match fs::read(self.project_root.join(&member.path)) {
                Ok(contents) => contents,
                Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
                Err(e) => return Err(e.into()),
            };
            if current == member.contents {
                continue;
            }

            let old = String::from_utf8_lossy(&member.contents);
            let new = String::from_utf8_lossy(&current);
            result
                .diff_content
                .push_str(&generate_diff(&old, &new, &member.path));
        }

        Ok(result)
    }
}

/// Generate a unified diff between two strings.
fn generate_diff(old: &str, new: &str, path: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut output = String::new();

    output.push_str(&format!("--- a/{path}\n"));
    output.push_str(&format!("+++ b/{path}\n"));

    for (idx, group) in diff.grouped_ops(3).iter().enumerate() {
        if idx > 0 {
            output.push_str("...\n");
        }

        for op in group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Delete => "-",
                    ChangeTag::Insert => "+",
                    ChangeTag::Equal => " ",
                };
                output.push_str(sign);
                output.push_str(change.value());
                if change.missing_newline() {
                    output.push('\n');
                }
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SnapshotMode;
    use aictx_test_utils::TestProject;
    use chrono::Utc;

    fn snapshot(files: &[&str]) -> Snapshot {
        Snapshot {
            id: SnapshotId::from("snap_20260101_000000"),
            created_at: Utc::now(),
            task_id: "task".to_string(),
            task_description: "Test".to_string(),
            agent: "manual".to_string(),
            mode: SnapshotMode::FileBackup,
            files_modified: files.iter().map(|f| f.to_string()).collect(),
            git_ref: None,
            backup_path: None,
        }
    }

    #[test]
    fn test_repository_diff_classifies_changes() {
        let project = TestProject::new()
            .with_file("keep.txt", "same")
            .with_file("edit.txt", "line1\n")
            .with_file("gone.txt", "bye\n")
            .with_git()
            .build();

        project.write_file("edit.txt", "line1\nline2\n");
        project.delete_file("gone.txt");
        project.write_file("new.txt", "hello\n");

        let engine = DiffEngine::new(project.path());
        let result = engine.diff(&snapshot(&[]), None).unwrap();

        assert_eq!(result.files_added, vec!["new.txt"]);
        assert_eq!(result.files_modified, vec!["edit.txt"]);
        assert_eq!(result.files_deleted, vec!["gone.txt"]);
        assert!(result.diff_content.contains("+line2"));
        assert!(result.diff_content.contains("-bye"));
        assert!(!result.is_empty());
    }

    #[test]
    fn test_clean_repository_diff_is_empty() {
        let project = TestProject::new().with_file("a.txt", "v1").with_git().build();

        let result = DiffEngine::new(project.path())
            .diff(&snapshot(&[]), None)
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(result.file_count(), 0);
    }

    #[test]
    fn test_unversioned_diff_reports_recorded_files() {
        let project = TestProject::new().with_file("a.txt", "v1").build();

        let result = DiffEngine::new(project.path())
            .diff(&snapshot(&["a.txt", "b.txt"]), None)
            .unwrap();

        assert_eq!(result.files_modified, vec!["a.txt", "b.txt"]);
        assert!(result.files_added.is_empty());
        assert!(result.files_deleted.is_empty());
        assert!(result.diff_content.is_empty());
    }

    #[test]
    fn test_unversioned_diff_against_archive() {
        let project = TestProject::new()
            .with_file("a.txt", "one\ntwo\n")
            .with_file("b.txt", "unchanged\n")
            .build();
        let dir = project.path().join(".ai-context/snapshots/snap_20260101_000000");
        fs::create_dir_all(&dir).unwrap();
        let files = vec!["a.txt".to_string(), "b.txt".to_string()];
        let archive = FileBackupBackend::new(project.path())
            .capture(&dir, &files)
            .unwrap();

        project.write_file("a.txt", "one\nthree\n");

        let result = DiffEngine::new(project.path())
            .diff(&snapshot(&["a.txt", "b.txt"]), Some(&archive))
            .unwrap();

        assert!(result.diff_content.contains("--- a/a.txt"));
        assert!(result.diff_content.contains("-two"));
        assert!(result.diff_content.contains("+three"));
        assert!(!result.diff_content.contains("b.txt"));
    }

    #[test]
    fn test_preview_caps_lines() {
        let mut result = DiffResult::new(SnapshotId::from("snap_x"));
        result.diff_content = (0..60).map(|i| format!("line {i}\n")).collect();

        let (lines, remaining) = result.preview(DIFF_PREVIEW_LINES);
        assert_eq!(lines.len(), 50);
        assert_eq!(lines[0], "line 0");
        assert_eq!(remaining, 10);

        let (lines, remaining) = result.preview(100);
        assert_eq!(lines.len(), 60);
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_generate_diff() {
        let diff = generate_diff("a\nb\n", "a\nc\n", "f.txt");
        assert!(diff.starts_with("--- a/f.txt\n+++ b/f.txt\n"));
        assert!(diff.contains("-b\n"));
        assert!(diff.contains("+c\n"));
    }
}
