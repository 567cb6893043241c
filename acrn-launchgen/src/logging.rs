//! Logging initialisation for the launch script generator.
//!
//! Diagnostics always go to stderr, filtered by `RUST_LOG` (default `info`).
//! With a log directory configured, the same events are also written
//! without ANSI colours to `acrn-launchgen.log` in that directory.
//!
//! The returned guard must be kept alive until exit so buffered log lines
//! are flushed.

use std::path::PathBuf;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::errors::{LaunchError, LaunchResult};

pub const LOG_FILE_NAME: &str = "acrn-launchgen.log";

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            log_dir: None,
        }
    }
}

pub struct LogGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Install the global tracing subscriber. Call once from `main`.
pub fn init_logging(config: &LogConfig) -> LaunchResult<LogGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, file_guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LaunchError::Config(format!("Failed to install log subscriber: {e}")))?;

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}
