//! Shared logging utilities for fieldlog binaries.
//!
//! Two sinks are installed: a daily-rolling file under `~/.fieldlog/logs` and
//! stderr. Both honour `RUST_LOG` first and fall back to the configured level.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const MAX_LOG_FILES: usize = 5;

/// Logging configuration shared by fieldlog binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Fallback filter directive when `RUST_LOG` is unset (e.g. "info").
    pub level: &'a str,
    /// Emit JSON lines instead of the human-readable format.
    pub json: bool,
    /// Mirror the file filter on stderr. Otherwise stderr only shows warnings.
    pub verbose: bool,
}

/// Keeps the background file writer alive. Drop it last, on process exit.
pub struct LogGuard {
    _file: WorkerGuard,
}

/// Initialize tracing with a rolling file writer and stderr output.
pub fn init_logging(config: LogConfig<'_>) -> Result<LogGuard> {
    let log_dir = ensure_logs_dir().context("Failed to ensure log directory")?;
    init_logging_in(config, log_dir)
}

/// Same as [`init_logging`] but writes log files into `log_dir`.
pub fn init_logging_in(config: LogConfig<'_>, log_dir: PathBuf) -> Result<LogGuard> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(sanitize_name(config.app_name))
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(&log_dir)
        .with_context(|| format!("Failed to open log file in {}", log_dir.display()))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let file_filter = build_filter(config.level);
    let console_filter = if config.verbose {
        build_filter(config.level)
    } else {
        EnvFilter::new("warn")
    };

    let (file_layer, console_layer) = if config.json {
        (
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter)
                .boxed(),
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        )
    } else {
        (
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter)
                .boxed(),
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        )
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogGuard { _file: guard })
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Get the fieldlog home directory: `$FIELDLOG_HOME` or `~/.fieldlog`.
pub fn fieldlog_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("FIELDLOG_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".fieldlog")
}

/// Get the logs directory: ~/.fieldlog/logs
pub fn logs_dir() -> PathBuf {
    fieldlog_home().join("logs")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}
