//! Custom assertion helpers for common test patterns.

use std::path::Path;

/// Assert that a file's content equals expected text exactly.
///
/// # Example
///
/// ```rust
/// use aictx_test_utils::assertions::assert_file_equals;
/// use std::fs;
/// use tempfile::TempDir;
///
/// let dir = TempDir::new().unwrap();
/// let path = dir.path().join("a.txt");
/// fs::write(&path, "v1").unwrap();
///
/// assert_file_equals(&path, "v1");
/// ```
pub fn assert_file_equals(path: &Path, expected: &str) {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read file {}: {}", path.display(), e));

    assert_eq!(
        content,
        expected,
        "File {} content does not match expected.\nExpected:\n{}\nActual:\n{}",
        path.display(),
        expected,
        content
    );
}

/// Assert that a file does not exist.
pub fn assert_file_absent(path: &Path) {
    assert!(
        !path.exists(),
        "File {} should not exist but does",
        path.display()
    );
}

/// Assert that a string contains a substring (with better error messages).
#[macro_export]
macro_rules! assert_str_contains {
    ($haystack:expr, $needle:expr) => {
        if !$haystack.contains($needle) {
            panic!(
                "String does not contain expected substring.\nExpected to find: {}\nIn string:\n{}",
                $needle, $haystack
            );
        }
    };
}
