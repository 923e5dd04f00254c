//! Snapshot and rollback engine for delegated coding tasks.
//!
//! This crate checkpoints a working tree before an external agent runs a
//! task, so the change can be inspected and undone afterwards:
//! - Git stash capture for repositories
//! - tar.gz file backups when no repository exists (or for untracked files)
//! - Diffs between a snapshot and the current state
//! - Full or per-file rollback, retention and an audit trail
//!
//! # Example
//!
//! ```no_run
//! use aictx_snapshot::{RollbackManager, SnapshotConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = RollbackManager::open("/project/root", SnapshotConfig::default())?;
//!
//! // Take a snapshot before the agent runs
//! let snapshot = manager.create_snapshot("task_42", "Add login form", "aider", None)?;
//!
//! // ... the agent edits files ...
//!
//! let diff = manager.diff(&snapshot.id)?;
//! if !diff.is_empty() {
//!     manager.rollback(&snapshot.id, None)?;
//! }
//! # Ok(())
//! # }
//! ```

mod archive;
mod config;
mod diff;
mod error;
mod git;
mod history;
mod manager;
mod mode;
mod retention;
mod snapshot;
mod store;

pub use archive::{ArchivedFile, FileBackupBackend, BACKUP_FILE};
pub use config::{SnapshotConfig, DEFAULT_STORAGE_DIR};
pub use diff::{DiffEngine, DiffResult, DIFF_PREVIEW_LINES};
pub use error::{SnapshotError, SnapshotResult};
pub use git::{
    is_git_repo, stash_message, stash_tag, GitStashBackend, STASH_PENDING_FILE, STASH_REF_FILE,
    STASH_TAG,
};
pub use history::{HistoryAction, HistoryEntry, HistoryLog, HISTORY_FILE};
pub use manager::RollbackManager;
pub use mode::{select_mode, RepoState};
pub use retention::RetentionPolicy;
pub use snapshot::{Snapshot, SnapshotId, SnapshotMode};
pub use store::SnapshotStore;
