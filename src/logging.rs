use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LogLevel;
use crate::fsutil;

/// Path of the log file for a run started at `started`
pub fn log_file_path(output_dir: &Path, started: DateTime<Utc>) -> PathBuf {
    output_dir
        .join("logs")
        .join(format!("{}.log", started.format("%Y%m%d_%H%M%S")))
}

/// Initialize logging to stderr and to a per-run file under `<output_dir>/logs`
///
/// `RUST_LOG` wins over `level` when set. Returns the log file path.
pub fn init(level: LogLevel, output_dir: &Path, started: DateTime<Utc>) -> Result<PathBuf> {
    let (path, file) = create_log_file(output_dir, started)?;

    run_subscriber(level, file)
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(path)
}

fn create_log_file(output_dir: &Path, started: DateTime<Utc>) -> Result<(PathBuf, File)> {
    let path = log_file_path(output_dir, started);
    if let Some(parent) = path.parent() {
        fsutil::ensure_directory_exists(parent)?;
    }

    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file: {}", path.display()))?;

    Ok((path, file))
}

fn run_subscriber(level: LogLevel, file: File) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_directive())))
}

/// Console-only logging, for commands that never write output files
pub fn init_console(level: LogLevel) {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_directive())))
        .try_init();
}
