//! Testing utilities and fixtures for aictx.
//!
//! - **Fixtures**: temporary project directories, optionally under git
//! - **Git**: repository helpers built on libgit2 (no `git` binary needed)
//! - **Assertions**: file content assertions with readable failures
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use aictx_test_utils::TestProject;
//!
//! #[test]
//! fn test_rollback() {
//!     let project = TestProject::new()
//!         .with_file("src/main.rs", "fn main() {}")
//!         .with_git()
//!         .build();
//!
//!     project.write_file("src/main.rs", "fn main() { todo!() }");
//!     // ... snapshot / rollback against project.path() ...
//! }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod git;

pub use fixtures::{BuiltTestProject, TestProject};
