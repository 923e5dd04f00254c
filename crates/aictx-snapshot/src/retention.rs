//! Bounded snapshot retention.

use crate::Snapshot;

/// Keeps the `keep_count` newest snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    keep_count: usize,
}

impl RetentionPolicy {
    pub fn new(keep_count: usize) -> Self {
        Self { keep_count }
    }

    pub fn keep_count(&self) -> usize {
        self.keep_count
    }

    /// Snapshots to prune from a newest-first listing.
    pub fn select<'a>(&self, snapshots: &'a [Snapshot]) -> &'a [Snapshot] {
        snapshots.get(self.keep_count..).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SnapshotId, SnapshotMode};
    use chrono::{Duration, Utc};

    fn listing(n: usize) -> Vec<Snapshot> {
        let now = Utc::now();
        (0..n)
            .map(|i| Snapshot {
                id: SnapshotId::from_string(format!("snap_{i}")),
                created_at: now - Duration::seconds(i as i64),
                task_id: format!("task_{i}"),
                task_description: String::new(),
                agent: "manual".to_string(),
                mode: SnapshotMode::FileBackup,
                files_modified: Vec::new(),
                git_ref: None,
                backup_path: Some("files.tar.gz".to_string()),
            })
            .collect()
    }

    #[test]
    fn test_selects_oldest_beyond_limit() {
        let snapshots = listing(5);
        let pruned = RetentionPolicy::new(2).select(&snapshots);

        let ids: Vec<&str> = pruned.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["snap_2", "snap_3", "snap_4"]);
    }

    #[test]
    fn test_nothing_to_prune() {
        let snapshots = listing(3);
        assert!(RetentionPolicy::new(3).select(&snapshots).is_empty());
        assert!(RetentionPolicy::new(10).select(&snapshots).is_empty());
        assert!(RetentionPolicy::new(0).select(&[]).is_empty());
    }

    #[test]
    fn test_keep_zero_prunes_everything() {
        let snapshots = listing(2);
        assert_eq!(RetentionPolicy::new(0).select(&snapshots).len(), 2);
    }
}
