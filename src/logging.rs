//! Tracing setup for the server and the command-line tool.
//!
//! The server logs to stdout and appends to a log file (`LEGALLENS_LOG_FILE`, or
//! `logs/legallens.log`). File writes go through a non-blocking worker whose guard lives for the
//! rest of the process. The CLI logs to stderr only so reports on stdout stay clean.
use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_LOG_FILE: &str = "logs/legallens.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the server subscriber: compact stdout plus the log file when it can be opened.
///
/// `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing() {
    let file_layer = open_log_file(&log_file_path()).map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .compact()
    });

    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(fmt::layer().with_target(false).compact())
        .with(file_layer)
        .init();
}

/// Install the CLI subscriber on stderr (`warn`, or `debug` when `verbose`).
pub fn init_cli_tracing(verbose: bool) {
    tracing_subscriber::registry()
        .with(env_filter(if verbose { "debug" } else { "warn" }))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

fn log_file_path() -> PathBuf {
    std::env::var_os("LEGALLENS_LOG_FILE")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
}

/// Open `path` for appending behind a non-blocking writer, creating its directory if needed.
///
/// Failures are reported on stderr and disable file logging; the subscriber is not up yet.
fn open_log_file(path: &Path) -> Option<NonBlocking> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        if let Err(err) = std::fs::create_dir_all(dir) {
            eprintln!("Failed to create log directory {}: {err}", dir.display());
            return None;
        }
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        Ok(file) => file,
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            return None;
        }
    };

    let (writer, guard) = tracing_appender::non_blocking(file);
    let _ = LOG_GUARD.set(guard);
    Some(writer)
}
