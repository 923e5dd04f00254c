//! Snapshot error types.

use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors that can occur during snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The project is not under version control.
    #[error("Project is not a git repository: {0}")]
    VcsUnavailable(String),

    /// A backend could not capture the working tree.
    #[error("Snapshot capture failed: {0}")]
    CaptureFailed(String),

    /// Snapshot not found.
    #[error("Snapshot not found: {0}")]
    NotFound(String),

    /// A backend could not restore the working tree.
    #[error("Rollback failed: {0}")]
    RestoreFailed(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error reported by libgit2.
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// Invalid snapshot ID.
    #[error("Invalid snapshot ID: {0}")]
    InvalidId(String),

    /// Snapshot metadata is unreadable or malformed.
    #[error("Snapshot storage corrupted: {0}")]
    Corrupted(String),
}

impl SnapshotError {
    /// Create a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// Create a capture failed error.
    pub fn capture_failed(message: impl Into<String>) -> Self {
        Self::CaptureFailed(message.into())
    }

    /// Create a restore failed error.
    pub fn restore_failed(message: impl Into<String>) -> Self {
        Self::RestoreFailed(message.into())
    }

    /// Whether this error means "the snapshot does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SnapshotError::not_found("snap_20260101_000000");
        assert_eq!(err.to_string(), "Snapshot not found: snap_20260101_000000");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: SnapshotError = io_err.into();
        assert!(matches!(err, SnapshotError::Io(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_capture_and_restore_helpers() {
        assert!(matches!(
            SnapshotError::capture_failed("nothing to stash"),
            SnapshotError::CaptureFailed(_)
        ));
        assert!(matches!(
            SnapshotError::restore_failed("checkout failed"),
            SnapshotError::RestoreFailed(_)
        ));
    }
}
