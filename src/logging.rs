//! Tracing setup for both binaries.
//!
//! Events go to the systemd journal when `[logging] journald` is on and the
//! journal is reachable; otherwise to a daily rolling `photoqueue.log` in
//! `[logging] dir`.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

const LOG_FILE: &str = "photoqueue.log";

/// Flushes the file writer on exit, so it lives as long as the process.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// `PHOTOQUEUE_LOG` when set (e.g. `photoqueue::moderation=debug`), else the
/// configured filter.
fn filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_env("PHOTOQUEUE_LOG").unwrap_or_else(|_| EnvFilter::new(&config.filter))
}

pub fn init(config: &LogConfig) -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        if config.journald {
            if let Ok(journald) = tracing_journald::layer() {
                tracing_subscriber::registry()
                    .with(filter(config))
                    .with(journald)
                    .try_init()?;
                tracing::debug!("Logging to journald");
                return Ok(());
            }
        }
    }

    init_file(config, &config.dir)
}

fn init_file(config: &LogConfig, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create log directory {:?}", dir))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE));
    let _ = FILE_GUARD.set(guard);

    tracing_subscriber::registry()
        .with(filter(config))
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()?;

    tracing::debug!(dir = ?dir, "Logging to file");
    Ok(())
}
