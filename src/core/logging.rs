//! Logging Initialization
//!
//! Library code logs through the `log` macros. The binary installs a
//! `tracing` registry with:
//! - a human-readable stdout layer
//! - a JSON file layer, rotated daily through `tracing-appender`
//!
//! `log` records reach both layers through `tracing-subscriber`'s log bridge.

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LogConfig;

/// Base name of the rolling log files.
pub const LOG_FILE: &str = "trademark-search.log";

/// Directory log files are written to: the configured override, else the
/// platform data directory, else `./logs`.
pub fn log_dir(config: &LogConfig) -> PathBuf {
    config.dir.clone().unwrap_or_else(|| {
        dirs::data_dir()
            .map(|d| d.join("trademark-search").join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"))
    })
}

/// `RUST_LOG` when set, otherwise the configured level.
fn filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Initialize the logging system.
///
/// Returns a `WorkerGuard` (when a file layer is installed) which must be
/// kept alive for the duration of the application so buffered records are
/// flushed on shutdown.
pub fn init(config: &LogConfig) -> Option<WorkerGuard> {
    let (file_layer, guard) = if config.json_file {
        let dir = log_dir(config);
        if let Err(e) = fs::create_dir_all(&dir) {
            eprintln!("Failed to create logs directory {}: {}", dir.display(), e);
        }
        let file_appender = tracing_appender::rolling::daily(&dir, LOG_FILE);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .json()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_filter(filter(config));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_target(true)
        .with_filter(filter(config));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .init();

    if config.json_file {
        log::info!(
            "Logging initialized. Writing to: {:?} (daily rolling)",
            log_dir(config).join(LOG_FILE)
        );
    }

    guard
}
