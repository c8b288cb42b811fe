use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use wdt::model::config::project_dirs;

const LOG_FILE_NAME: &str = "wdt.log";

pub fn logs_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| std::env::temp_dir().join("wdt-logs"))
}

/// Diagnostics go to a daily rolling file, never stdout: the interface owns
/// the terminal. The guard must live until exit so buffered lines are flushed.
pub fn init() -> Result<WorkerGuard> {
    let dir = logs_dir();
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(&dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wdt=info"));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow!("install log subscriber: {e}"))?;

    Ok(guard)
}
