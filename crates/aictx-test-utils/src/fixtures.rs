//! Test fixtures for creating reproducible test environments.
//!
//! Provides utilities for setting up temporary project directories,
//! optionally initialized as git repositories with everything committed.

use crate::git::{commit_all, init_repo};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary test project with configurable file structure.
///
/// Creates a temporary directory that is automatically cleaned up
/// when the built project is dropped.
///
/// # Example
///
/// ```rust
/// use aictx_test_utils::fixtures::TestProject;
///
/// let project = TestProject::new()
///     .with_file("src/main.rs", "fn main() { println!(\"Hello\"); }")
///     .with_dir("src/modules")
///     .build();
///
/// assert!(project.path().join("src/main.rs").exists());
/// assert!(!project.is_git());
/// ```
pub struct TestProject {
    /// The temporary directory backing this project.
    temp_dir: TempDir,
    /// Files to create (path relative to root -> contents).
    files: BTreeMap<PathBuf, String>,
    /// Directories to create (paths relative to root).
    dirs: Vec<PathBuf>,
    /// Whether to initialize a repository and commit the files.
    git: bool,
}

impl TestProject {
    /// Create a new test project builder.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
            files: BTreeMap::new(),
            dirs: Vec::new(),
            git: false,
        }
    }

    /// Add a file to the project.
    ///
    /// The path should be relative to the project root.
    /// Parent directories are created automatically.
    pub fn with_file(mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.files
            .insert(path.as_ref().to_path_buf(), contents.into());
        self
    }

    /// Add an empty directory to the project.
    pub fn with_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.dirs.push(path.as_ref().to_path_buf());
        self
    }

    /// Add an aictx configuration file.
    pub fn with_config(self, config: &str) -> Self {
        self.with_file("aictx.json", config)
    }

    /// Add a .gitignore file.
    pub fn with_gitignore(self, contents: &str) -> Self {
        self.with_file(".gitignore", contents)
    }

    /// Initialize a git repository and commit every file on build.
    pub fn with_git(mut self) -> Self {
        self.git = true;
        self
    }

    /// Build the project, creating all files and directories.
    pub fn build(self) -> BuiltTestProject {
        let root = self.temp_dir.path();

        // Create directories first
        for dir in &self.dirs {
            let full_path = root.join(dir);
            fs::create_dir_all(&full_path).unwrap_or_else(|e| {
                panic!("Failed to create directory {}: {}", full_path.display(), e)
            });
        }

        // Create files (parent directories are created automatically)
        for (path, contents) in &self.files {
            let full_path = root.join(path);
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent).unwrap_or_else(|e| {
                    panic!(
                        "Failed to create parent directory for {}: {}",
                        full_path.display(),
                        e
                    )
                });
            }
            fs::write(&full_path, contents)
                .unwrap_or_else(|e| panic!("Failed to write file {}: {}", full_path.display(), e));
        }

        if self.git {
            let repo = init_repo(root);
            commit_all(&repo, "initial commit");
        }

        BuiltTestProject {
            temp_dir: self.temp_dir,
            git: self.git,
        }
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// A built test project with files created on disk.
///
/// The temporary directory is automatically cleaned up when this is dropped.
pub struct BuiltTestProject {
    temp_dir: TempDir,
    git: bool,
}

impl BuiltTestProject {
    /// Get the path to the project root.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Whether the project was initialized as a git repository.
    pub fn is_git(&self) -> bool {
        self.git
    }

    /// Read a file from the project.
    pub fn read_file(&self, path: impl AsRef<Path>) -> String {
        let full_path = self.path().join(path.as_ref());
        fs::read_to_string(&full_path)
            .unwrap_or_else(|e| panic!("Failed to read file {}: {}", full_path.display(), e))
    }

    /// Check if a file exists in the project.
    pub fn file_exists(&self, path: impl AsRef<Path>) -> bool {
        self.path().join(path.as_ref()).exists()
    }

    /// Write a file to the project (for modifying during tests).
    pub fn write_file(&self, path: impl AsRef<Path>, contents: impl AsRef<str>) {
        let full_path = self.path().join(path.as_ref());
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).ok();
        }
        fs::write(&full_path, contents.as_ref())
            .unwrap_or_else(|e| panic!("Failed to write file {}: {}", full_path.display(), e));
    }

    /// Delete a file from the project.
    pub fn delete_file(&self, path: impl AsRef<Path>) {
        let full_path = self.path().join(path.as_ref());
        fs::remove_file(&full_path)
            .unwrap_or_else(|e| panic!("Failed to delete file {}: {}", full_path.display(), e));
    }
}
