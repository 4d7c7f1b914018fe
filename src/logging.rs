use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

/// Routes `tracing` output to a log file; the terminal belongs to the UI.
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(cfg: &LogConfig) -> Result<PathBuf> {
    let path = cfg
        .file
        .clone()
        .or_else(default_log_path)
        .context("logging: no log file location")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("logging: create {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("logging: open {}", path.display()))?;

    let level = if cfg.level.trim().is_empty() {
        "info"
    } else {
        cfg.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false),
        )
        .try_init()
        .map_err(|err| anyhow!("logging: {err}"))?;

    Ok(path)
}

fn default_log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("postboard").join("postboard.log"))
}
