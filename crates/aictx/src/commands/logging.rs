//! Logging initialization and configuration.
//!
//! Logs go to a file in the platform log directory so stdout stays free
//! for command output.

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Initialize logging.
///
/// `RUST_LOG` takes precedence. Otherwise `--verbose` selects debug, then
/// the configured level, then info. Returns the log file path when logging
/// to a file; falls back to warnings on stderr.
pub fn init_logging(verbose: bool, level: Option<&str>) -> Option<PathBuf> {
    let level = if verbose {
        "debug"
    } else {
        level.unwrap_or("info")
    };
    let default_filter = format!("aictx={level},aictx_snapshot={level}");

    let log_file = open_log_file();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if log_file.is_some() {
            EnvFilter::new(&default_filter)
        } else {
            EnvFilter::new("aictx=warn,aictx_snapshot=warn")
        }
    });

    match log_file {
        Some((path, file)) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(file)
                .init();
            Some(path)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

fn open_log_file() -> Option<(PathBuf, std::fs::File)> {
    let log_dir = get_log_dir();

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {e}");
        return None;
    }

    let log_file = log_dir.join("aictx.log");
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
    {
        Ok(file) => Some((log_file, file)),
        Err(e) => {
            eprintln!("Warning: Could not open log file: {e}");
            None
        }
    }
}

/// Get the log directory path.
pub fn get_log_dir() -> PathBuf {
    // macOS: ~/Library/Logs/aictx
    // Linux: ~/.local/state/aictx/logs
    // Windows: %LOCALAPPDATA%/aictx/logs

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = dirs::home_dir() {
            return home.join("Library/Logs/aictx");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Some(state_dir) = dirs::state_dir() {
            return state_dir.join("aictx/logs");
        }
        if let Some(home) = dirs::home_dir() {
            return home.join(".local/state/aictx/logs");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(local_app) = dirs::data_local_dir() {
            return local_app.join("aictx/logs");
        }
    }

    // Fallback
    std::env::temp_dir().join("aictx/logs")
}
