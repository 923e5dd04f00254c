//! Command handlers for the aictx CLI.
//!
//! Handlers print to stdout and return the process exit code. "Not found"
//! answers are reported and mapped to a failure code; real errors are
//! returned to `main`.

pub mod history;
pub mod logging;
pub mod prompt;
pub mod rollback;
pub mod snapshot;

pub use history::*;
pub use logging::*;
pub use prompt::*;
pub use rollback::*;
pub use snapshot::*;
