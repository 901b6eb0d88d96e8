// src/logging.rs

//! Logging setup for `procward` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `PROCWARD_LOG` environment variable, either a bare level ("debug")
//!    or a full directive list ("procward=debug,info")
//! 3. default to `info`
//!
//! Logs always go to STDERR: stdout carries the event stream. When a log
//! directory is configured, the same events are also written to one file
//! per run, `procward_YYYYMMDD_HHMMSS.log`.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "PROCWARD_LOG";

/// Initialise the global logging subscriber. Call once at startup.
///
/// The returned guard flushes the log file when dropped; keep it alive
/// until the process exits.
pub fn init_logging(
    cli_level: Option<LogLevel>,
    log_dir: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let filter = match cli_level {
        Some(lvl) => EnvFilter::new(directive_for(lvl)),
        None => std::env::var(LOG_ENV_VAR)
            .ok()
            .and_then(|s| parse_filter(&s))
            .unwrap_or_else(|| EnvFilter::new("info")),
    };

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr);

    let (file_layer, guard, log_path) = match log_dir {
        Some(dir) => {
            let (writer, guard, path) = run_log_writer(dir, Local::now())?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer);
            (Some(layer), Some(guard), Some(path))
        }
        None => (None, None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to initialise logging: {e}"))?;

    if let Some(path) = log_path {
        tracing::info!(path = %path.display(), "writing log file");
    }

    Ok(guard)
}

/// File name of the log for a run started at `started`.
pub fn run_log_path(dir: &Path, started: DateTime<Local>) -> PathBuf {
    dir.join(format!("procward_{}.log", started.format("%Y%m%d_%H%M%S")))
}

/// Open the run log under `dir` behind a non-blocking writer.
pub fn run_log_writer(
    dir: &Path,
    started: DateTime<Local>,
) -> Result<(NonBlocking, WorkerGuard, PathBuf)> {
    let (file, path) = open_run_log(dir, started)?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    Ok((writer, guard, path))
}

fn open_run_log(dir: &Path, started: DateTime<Local>) -> Result<(File, PathBuf)> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    let path = run_log_path(dir, started);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    Ok((file, path))
}

fn directive_for(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

fn parse_filter(s: &str) -> Option<EnvFilter> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let normalized = match s.to_lowercase().as_str() {
        "warning" => "warn".to_string(),
        _ => s.to_string(),
    };
    EnvFilter::try_new(normalized).ok()
}
