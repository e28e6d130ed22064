//! Structured logging for wavescope using the tracing crate.
//!
//! Log records go to a daily-rotated file so nothing reaches the terminal while the
//! visualizer owns it. Files live under the XDG state directory and only the 7 most
//! recent are kept.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_appender::rolling;
use tracing_subscriber::prelude::*;

/// File name prefix of every log file; the appender adds a `.YYYY-MM-DD` suffix.
pub const LOG_FILE_PREFIX: &str = "wavescope.log";

const MAX_LOG_FILES: usize = 7;

/// Keeps the non-blocking writer alive for the program lifetime.
static APPENDER_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Initializes the logging system with file-based output.
///
/// Log level is controlled by the RUST_LOG environment variable (defaults to "info").
///
/// # Errors
/// - If the log directory cannot be determined or created
/// - If logging was already initialized
pub fn init_logging() -> anyhow::Result<()> {
    let log_dir = log_dir()?;

    if let Err(e) = cleanup_old_logs(&log_dir) {
        eprintln!("Warning: Failed to clean up old logs: {e}");
    }

    let file_appender = rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    APPENDER_GUARD
        .set(guard)
        .map_err(|_| anyhow::anyhow!("Logging already initialized"))?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_ansi(false),
        )
        .init();

    tracing::debug!("Logging initialized. Log directory: {}", log_dir.display());
    Ok(())
}

/// Returns the log directory, creating it if needed.
///
/// Prefers XDG_STATE_HOME if set, otherwise uses ~/.local/state/wavescope.
///
/// # Errors
/// - If home directory cannot be determined
/// - If log directory cannot be created
pub fn log_dir() -> anyhow::Result<PathBuf> {
    let log_dir = match std::env::var_os("XDG_STATE_HOME") {
        Some(xdg_state) if !xdg_state.is_empty() => PathBuf::from(xdg_state).join("wavescope"),
        _ => dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?
            .join(".local/state/wavescope"),
    };

    fs::create_dir_all(&log_dir)?;

    Ok(log_dir)
}

/// Lists rotated log files in `log_dir`, newest first.
///
/// # Errors
/// - If the log directory cannot be read
pub fn rotated_log_files(log_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let rotated_prefix = format!("{LOG_FILE_PREFIX}.");
    let mut log_files: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            let file_name = path.file_name()?.to_string_lossy().to_string();

            // wavescope.log.YYYY-MM-DD
            let date = file_name.strip_prefix(&rotated_prefix)?;
            if date.matches('-').count() != 2 {
                return None;
            }
            let modified = fs::metadata(&path).ok()?.modified().ok()?;
            Some((path, modified))
        })
        .collect();

    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    Ok(log_files.into_iter().map(|(path, _)| path).collect())
}

/// Removes log files beyond the 7 most recent.
///
/// # Errors
/// - If the log directory cannot be read
fn cleanup_old_logs(log_dir: &Path) -> anyhow::Result<()> {
    for path in rotated_log_files(log_dir)?.iter().skip(MAX_LOG_FILES) {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Failed to delete old log file {}: {}", path.display(), e);
        }
    }

    Ok(())
}
