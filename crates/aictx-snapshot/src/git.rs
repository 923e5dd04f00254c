//! Git stash backend.
//!
//! Captures a checkpoint by pushing a stash entry, recording its reference
//! and immediately popping it back, so the working tree is left exactly as
//! it was. Restores by checking paths out of `HEAD`.

use crate::mode::RepoState;
use crate::{SnapshotError, SnapshotId, SnapshotResult};
use git2::build::CheckoutBuilder;
use git2::{
    ErrorCode, Repository, Signature, StashApplyOptions, StashFlags, Status, StatusOptions,
};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Prefix of every stash message written by aictx.
pub const STASH_TAG: &str = "ai-context:";

/// File holding the recorded stash reference.
pub const STASH_REF_FILE: &str = "stash_ref.txt";

/// Intent marker present only while a capture has a stash entry pushed
/// but not yet popped back. Holds the entry's [`stash_tag`].
pub const STASH_PENDING_FILE: &str = "stash_pending";

/// Single-line tag identifying the stash entry of a snapshot.
pub fn stash_tag(snapshot_id: &SnapshotId) -> String {
    format!("{STASH_TAG} [{snapshot_id}]")
}

/// Stash message: the tag first, then `description` on the same line.
pub fn stash_message(snapshot_id: &SnapshotId, description: &str) -> String {
    let description = description.split_whitespace().collect::<Vec<_>>().join(" ");
    format!("{} {description}", stash_tag(snapshot_id))
}

/// Whether `project_root` itself is a git repository.
pub fn is_git_repo(project_root: &Path) -> bool {
    project_root.join(".git").exists()
}

/// Open the repository rooted at `project_root` (no parent discovery).
pub(crate) fn open_repository(project_root: &Path) -> SnapshotResult<Repository> {
    if !is_git_repo(project_root) {
        return Err(SnapshotError::VcsUnavailable(
            project_root.display().to_string(),
        ));
    }
    Ok(Repository::open(project_root)?)
}

/// Captures and restores working-tree state through git stash primitives.
#[derive(Debug, Clone)]
pub struct GitStashBackend {
    project_root: PathBuf,
}

impl GitStashBackend {
    /// Create a backend for the repository at `project_root`.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    /// Whether the project is under version control.
    pub fn is_repo(&self) -> bool {
        is_git_repo(&self.project_root)
    }

    /// Inspect the repository for mode selection.
    ///
    /// A repository that cannot be read is treated as unversioned.
    pub fn repo_state(&self) -> RepoState {
        if !self.is_repo() {
            return RepoState::unversioned();
        }

        match self.untracked_files() {
            Ok(untracked) => RepoState {
                is_git_repo: true,
                has_untracked: !untracked.is_empty(),
            },
            Err(e) => {
                warn!(error = %e, "Failed to read repository status, treating as unversioned");
                RepoState::unversioned()
            }
        }
    }

    /// Every path with a working-tree or index change, untracked included
    /// (ignored files excluded).
    pub fn status_files(&self) -> SnapshotResult<Vec<String>> {
        self.collect_status(|_| true)
    }

    /// Untracked, non-ignored files.
    pub fn untracked_files(&self) -> SnapshotResult<Vec<String>> {
        self.collect_status(|status| status.is_wt_new())
    }

    /// Push, locate, record and pop a stash entry for `snapshot_id`.
    ///
    /// Returns the recorded reference (`stash@{N}`). The working tree is back
    /// in its pre-capture state when this returns, whether it succeeded or
    /// not, unless popping itself failed; in that case the intent marker is
    /// left behind for [`GitStashBackend::recover`].
    pub fn capture(
        &self,
        snapshot_dir: &Path,
        snapshot_id: &SnapshotId,
        description: &str,
    ) -> SnapshotResult<String> {
        let mut repo = open_repository(&self.project_root)?;
        let tag = stash_tag(snapshot_id);
        let message = stash_message(snapshot_id, description);

        let marker = snapshot_dir.join(STASH_PENDING_FILE);
        fs::write(&marker, &tag)?;

        let signature = stash_signature(&repo)?;
        if let Err(e) = repo.stash_save(&signature, &message, Some(StashFlags::INCLUDE_UNTRACKED)) {
            remove_marker(&marker);
            return Err(SnapshotError::capture_failed(format!(
                "git stash push failed: {}",
                e.message()
            )));
        }
        debug!(message = %message, "Pushed stash entry");

        let located = find_stash(&mut repo, &tag);
        // The entry just pushed is always at the top of the stack.
        let index = match &located {
            Ok(Some(index)) => *index,
            _ => 0,
        };

        let recorded = match located {
            Ok(Some(index)) => {
                let stash_ref = format!("stash@{{{index}}}");
                fs::write(snapshot_dir.join(STASH_REF_FILE), &stash_ref)
                    .map(|_| stash_ref)
                    .map_err(SnapshotError::from)
            }
            Ok(None) => Err(SnapshotError::capture_failed(
                "stash entry not found after push",
            )),
            Err(e) => Err(e),
        };

        // Put the user's files back before reporting anything.
        pop_stash(&mut repo, index).map_err(|e| {
            SnapshotError::capture_failed(format!(
                "stash pushed but could not be popped back (kept as stash@{{{index}}}): {e}"
            ))
        })?;
        remove_marker(&marker);

        recorded
    }

    /// Whether a capture into `snapshot_dir` was interrupted.
    pub fn has_pending(snapshot_dir: &Path) -> bool {
        snapshot_dir.join(STASH_PENDING_FILE).is_file()
    }

    /// Finish an interrupted capture by popping its stash entry back.
    ///
    /// Returns `false` when there was nothing to recover.
    pub fn recover(&self, snapshot_dir: &Path) -> SnapshotResult<bool> {
        let marker = snapshot_dir.join(STASH_PENDING_FILE);
        let tag = match fs::read_to_string(&marker) {
            Ok(tag) => tag.trim().to_string(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let mut repo = open_repository(&self.project_root)?;
        match find_stash(&mut repo, &tag)? {
            Some(index) => {
                pop_stash(&mut repo, index)?;
                info!(stash = index, "Popped stash left behind by an interrupted capture");
            }
            None => warn!(
                tag = %tag,
                "Interrupted capture left no matching stash entry; check `git stash list`"
            ),
        }

        fs::remove_file(&marker)?;
        Ok(true)
    }

    /// Discard every uncommitted change: force-checkout tracked paths from
    /// `HEAD`, then delete untracked files and untracked directories (empty
    /// ones included). Ignored paths are kept.
    ///
    /// This reverts to the last commit, not to the snapshot point.
    pub fn restore_all(&self) -> SnapshotResult<()> {
        let repo = open_repository(&self.project_root)?;

        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        repo.checkout_head(Some(&mut checkout)).map_err(|e| {
            SnapshotError::restore_failed(format!("checkout of HEAD failed: {}", e.message()))
        })?;

        let untracked = self.untracked_files()?;
        for file in &untracked {
            let path = self.project_root.join(file);
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match removed {
                Ok(()) => debug!(file = %file, "Removed untracked file"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(SnapshotError::restore_failed(format!(
                        "failed to remove {}: {}",
                        file, e
                    )))
                }
            }
        }

        let dirs = remove_empty_dirs(&repo, &self.project_root, Path::new(""))?;

        info!(files = untracked.len(), dirs, "Reset working tree to HEAD");
        Ok(())
    }

    /// Restore only the named paths from `HEAD`.
    pub fn restore_paths(&self, files: &[String]) -> SnapshotResult<()> {
        let repo = open_repository(&self.project_root)?;

        let mut checkout = CheckoutBuilder::new();
        checkout.force().disable_pathspec_match(true);
        for file in files {
            checkout.path(file.as_str());
        }

        repo.checkout_head(Some(&mut checkout)).map_err(|e| {
            SnapshotError::restore_failed(format!("checkout of paths failed: {}", e.message()))
        })?;

        info!(files = files.len(), "Restored paths from HEAD");
        Ok(())
    }

    fn collect_status(&self, keep: impl Fn(Status) -> bool) -> SnapshotResult<Vec<String>> {
        let repo = open_repository(&self.project_root)?;

        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false)
            .include_unmodified(false)
            .exclude_submodules(true);

        let statuses = repo.statuses(Some(&mut opts))?;
        let mut files = Vec::new();
        for entry in statuses.iter() {
            let status = entry.status();
            if status.is_empty() || status.is_ignored() || !keep(status) {
                continue;
            }
            if let Some(path) = entry.path() {
                files.push(path.to_string());
            }
        }

        Ok(files)
    }
}

/// Identity used for stash commits; falls back when the repository has no
/// `user.name`/`user.email` configured.
fn stash_signature(repo: &Repository) -> SnapshotResult<Signature<'static>> {
    match repo.signature() {
        Ok(signature) => Ok(signature.to_owned()),
        Err(e) if e.code() == ErrorCode::NotFound => {
            Ok(Signature::now("aictx", "aictx@localhost")?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Index of the newest stash entry whose message contains `tag`.
fn find_stash(repo: &mut Repository, tag: &str) -> SnapshotResult<Option<usize>> {
    let mut found = None;
    repo.stash_foreach(|index, message, _oid| {
        if message.contains(tag) {
            found = Some(index);
            false
        } else {
            true
        }
    })?;
    Ok(found)
}

/// Depth-first removal of empty, non-ignored directories below `relative`.
/// Returns how many were removed.
fn remove_empty_dirs(repo: &Repository, root: &Path, relative: &Path) -> SnapshotResult<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(root.join(relative))? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() || entry.file_name() == ".git" {
            continue;
        }

        let child = relative.join(entry.file_name());
        let pattern = format!("{}/", child.to_string_lossy().replace('\\', "/"));
        if repo.is_path_ignored(&pattern)? {
            continue;
        }

        removed += remove_empty_dirs(repo, root, &child)?;
        let path = root.join(&child);
        if fs::read_dir(&path)?.next().is_none() {
            fs::remove_dir(&path).map_err(|e| {
                SnapshotError::restore_failed(format!(
                    "failed to remove {}: {}",
                    child.display(),
                    e
                ))
            })?;
            debug!(dir = %child.display(), "Removed untracked directory");
            removed += 1;
        }
    }
    Ok(removed)
}

fn pop_stash(repo: &mut Repository, index: usize) -> SnapshotResult<()> {
    let mut opts = StashApplyOptions::new();
    opts.reinstantiate_index();
    repo.stash_pop(index, Some(&mut opts))?;
    debug!(stash = index, "Popped stash entry");
    Ok(())
}

fn remove_marker(marker: &Path) {
    if let Err(e) = fs::remove_file(marker) {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %marker.display(), error = %e, "Failed to remove stash intent marker");
        }
    }
}
