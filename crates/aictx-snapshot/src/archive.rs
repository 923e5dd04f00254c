//! File backup backend: tar.gz copies of a file list.

use crate::{SnapshotError, SnapshotResult};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, EntryType};
use tracing::{debug, info};

/// Archive file name inside a snapshot directory.
pub const BACKUP_FILE: &str = "files.tar.gz";

/// A regular file read back from an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedFile {
    /// Member name (relative to the project root).
    pub path: String,
    pub contents: Vec<u8>,
}

/// Captures and restores files through a gzip-compressed tar archive.
#[derive(Debug, Clone)]
pub struct FileBackupBackend {
    project_root: PathBuf,
}

impl FileBackupBackend {
    /// Create a backend for files under `project_root`.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    /// Archive `files` into `snapshot_dir`, stored relative to the project
    /// root. Files that no longer exist are skipped.
    ///
    /// Always writes an archive, possibly empty, and returns its path.
    pub fn capture(&self, snapshot_dir: &Path, files: &[String]) -> SnapshotResult<PathBuf> {
        let backup_path = snapshot_dir.join(BACKUP_FILE);
        let file = File::create(&backup_path)?;

        let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
        builder.follow_symlinks(false);

        let mut archived = 0;
        for name in files {
            let full_path = self.project_root.join(name);
            let metadata = match fs::symlink_metadata(&full_path) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(file = %name, "Skipping missing file");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if metadata.is_dir() {
                builder.append_dir_all(name, &full_path)?;
            } else {
                builder.append_path_with_name(&full_path, name)?;
            }
            archived += 1;
        }

        builder.into_inner()?.finish()?;

        info!(
            path = %backup_path.display(),
            files = archived,
            "Wrote file backup"
        );
        Ok(backup_path)
    }

    /// Extract an archive over the project root.
    ///
    /// With `files`, only members with exactly those names are extracted.
    /// Existing files are overwritten. Returns the number of members
    /// extracted.
    pub fn restore(&self, archive_path: &Path, files: Option<&[String]>) -> SnapshotResult<usize> {
        let mut archive = open_archive(archive_path)?;
        archive.set_overwrite(true);

        let mut restored = 0;
        for entry in archive.entries()? {
            let mut entry = entry?;
            let name = member_name(&entry.path()?);

            if let Some(filter) = files {
                if !filter.iter().any(|f| f == &name) {
                    continue;
                }
            }

            // unpack_in refuses members that would land outside the root
            if entry.unpack_in(&self.project_root)? {
                debug!(file = %name, "Restored from backup");
                restored += 1;
            } else {
                return Err(SnapshotError::restore_failed(format!(
                    "archive member escapes project root: {name}"
                )));
            }
        }

        info!(
            path = %archive_path.display(),
            files = restored,
            "Restored file backup"
        );
        Ok(restored)
    }

    /// Read every regular file stored in an archive.
    pub fn read_files(&self, archive_path: &Path) -> SnapshotResult<Vec<ArchivedFile>> {
        let mut archive = open_archive(archive_path)?;

        let mut files = Vec::new();
        for entry in archive.entries()? {
            let mut entry = entry?;
            if entry.header().entry_type() != EntryType::Regular {
                continue;
            }
            let path = member_name(&entry.path()?);
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents)?;
            files.push(ArchivedFile { path, contents });
        }

        Ok(files)
    }
}

fn open_archive(path: &Path) -> SnapshotResult<Archive<GzDecoder<File>>> {
    let file = File::open(path)?;
    Ok(Archive::new(GzDecoder::new(file)))
}

fn member_name(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .trim_end_matches('/')
        .to_string()
}
