//! Logging configuration for athena-mcp.
//!
//! Stdout carries the protocol stream, so logs never go there: they are
//! written to stderr by default, or to a file when one is requested.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initializes logging to stderr.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

/// Initializes logging to a file, falling back to stderr if it cannot be
/// created.
pub fn init_file_logging(log_path: &Path) {
    if let Some(parent) = log_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("Warning: Could not create log directory: {e}");
            init_stderr_logging();
            return;
        }
    }

    // Truncate on each run to avoid unbounded growth
    let log_file = match File::create(log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {e}");
            init_stderr_logging();
            return;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();
}

/// Returns the default log file path.
///
/// Uses the XDG state directory on Linux (`~/.local/state/athena-mcp/athena-mcp.log`),
/// or falls back to the config directory on other platforms.
pub fn get_log_path() -> PathBuf {
    if let Some(state_dir) = dirs::state_dir() {
        return state_dir.join("athena-mcp").join("athena-mcp.log");
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("athena-mcp").join("athena-mcp.log");
    }

    std::env::temp_dir().join("athena-mcp.log")
}
