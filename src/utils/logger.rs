//! Logging initialization.
//!
//! Logs go to a file so they never interleave with command output on the
//! terminal. Each run gets its own file, e.g. `logs/rash.2026-10-19-14-30-25.log`.
//!
//! The level is taken from `RUST_LOG` and defaults to `info`:
//! - `RUST_LOG=debug` - per-command phases and artifact paths
//! - `RUST_LOG=info` - session lifecycle and command summaries
//! - `RUST_LOG=warn` - advisories and aborted commands only

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default log directory: `logs/` next to the executable, or in the current
/// directory when the executable path is unknown.
fn default_log_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("logs")))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Initialize file logging and return the path of the log file.
///
/// Failing to create the directory or file is not fatal: a warning is printed
/// and the process runs without logs.
pub fn init_logging(log_dir: Option<&Path>) -> Option<PathBuf> {
    let log_dir = log_dir.map_or_else(default_log_dir, Path::to_path_buf);

    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create logs directory: {}", e);
        return None;
    }

    let timestamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
    let log_path = log_dir.join(format!("rash.{}.log", timestamp));

    let log_file = match fs::File::create(&log_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: Failed to create log file: {}", e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
    {
        eprintln!("Warning: Failed to install logger: {}", e);
        return None;
    }

    // The writer must outlive every span; leak the guard for the process lifetime.
    std::mem::forget(guard);

    tracing::info!("Logging initialized - writing to {}", log_path.display());
    Some(log_path)
}
