use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "inventory_core=info,inventory_tui=info";
const LOG_FILE: &str = "inventory-tui.log";
const MAX_LOG_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Sends tracing output to a file under `log_dir`. The terminal is owned by
/// the TUI, so nothing is written to stderr.
pub fn init_logging(log_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create logs directory: {}", log_dir.display()))?;

    let path = log_dir.join(LOG_FILE);
    rotate_if_large(&path)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(path)
}

fn rotate_if_large(path: &Path) -> Result<()> {
    let Ok(metadata) = fs::metadata(path) else {
        return Ok(());
    };
    if metadata.len() > MAX_LOG_FILE_SIZE {
        let rotated = path.with_extension("log.1");
        fs::rename(path, &rotated)
            .with_context(|| format!("Failed to rotate log file: {}", path.display()))?;
    }
    Ok(())
}
