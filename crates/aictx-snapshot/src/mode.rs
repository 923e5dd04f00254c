//! Capture mode selection.

use crate::SnapshotMode;

/// The facts about a project that decide how it is snapshotted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepoState {
    /// The project root is a git repository.
    pub is_git_repo: bool,
    /// Untracked, non-ignored files exist in the working tree.
    pub has_untracked: bool,
}

impl RepoState {
    /// State of a project without version control.
    pub fn unversioned() -> Self {
        Self::default()
    }
}

/// Pick the capture mode for a project.
///
/// Untracked files are archived instead of relying on the stash alone,
/// since stash round-trips of untracked files are unreliable.
pub fn select_mode(state: &RepoState) -> SnapshotMode {
    match (state.is_git_repo, state.has_untracked) {
        (false, _) => SnapshotMode::FileBackup,
        (true, false) => SnapshotMode::GitStash,
        (true, true) => SnapshotMode::Hybrid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unversioned_uses_file_backup() {
        assert_eq!(select_mode(&RepoState::unversioned()), SnapshotMode::FileBackup);
        // Untracked is meaningless without a repository
        let state = RepoState {
            is_git_repo: false,
            has_untracked: true,
        };
        assert_eq!(select_mode(&state), SnapshotMode::FileBackup);
    }

    #[test]
    fn test_clean_repo_uses_stash() {
        let state = RepoState {
            is_git_repo: true,
            has_untracked: false,
        };
        assert_eq!(select_mode(&state), SnapshotMode::GitStash);
    }

    #[test]
    fn test_untracked_files_use_hybrid() {
        let state = RepoState {
            is_git_repo: true,
            has_untracked: true,
        };
        assert_eq!(select_mode(&state), SnapshotMode::Hybrid);
    }
}
