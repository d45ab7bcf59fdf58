//! Logging setup for Mission Deck using tracing.
//!
//! Logs go to stderr and to a daily file under `<home>/logs`, so a
//! `MISSION_DECK_HOME` override moves the logs along with the state files.
//! `MISSION_DECK_LOG_FORMAT=json` switches the file layer to JSON lines for
//! log shippers.

use anyhow::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable selecting the file log format.
pub const LOG_FORMAT_ENV: &str = "MISSION_DECK_LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset. The HTTP trace layer is kept at
/// `info` so request spans show up without enabling tower-http debug noise.
const DEFAULT_FILTER: &str = "info,mission_deck=debug,tower_http=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Unknown or empty values fall back to text.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Initialize logging with a daily file appender and console output.
///
/// The returned guard must be held for as long as file logging should flush.
pub fn init() -> Result<(WorkerGuard, PathBuf)> {
    let log_dir = log_dir()?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "mission-deck.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let format = LogFormat::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref());

    let (text_layer, json_layer) = match format {
        LogFormat::Text => (
            Some(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_current_span(true)
                    .with_target(true),
            ),
        ),
    };

    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(console_layer)
        .try_init()?;

    tracing::info!("Mission Deck {} logging to {} ({:?})", env!("CARGO_PKG_VERSION"), log_dir.display(), format);

    Ok((guard, log_dir))
}

fn log_dir() -> Result<PathBuf> {
    Ok(crate::config::get_home_dir()?.join("logs"))
}

/// Console-only logging for tests. Safe to call more than once.
#[cfg(test)]
pub fn init_test() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer())
        .try_init();
}
