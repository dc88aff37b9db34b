//! File logging with daily rotation under the data dir.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const LOG_FILE_PREFIX: &str = "sentimental.log";

/// Keeps the background writer alive; drop it last so buffered lines flush.
pub struct LoggingGuard {
    _guard: WorkerGuard,
    pub log_directory: PathBuf,
}

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `level` when set.
pub fn init(log_dir: &Path, level: &str) -> Result<LoggingGuard> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(log_dir = %log_dir.display(), "Logging initialised");

    Ok(LoggingGuard {
        _guard: guard,
        log_directory: log_dir.to_path_buf(),
    })
}
