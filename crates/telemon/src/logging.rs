//! Tracing setup: a console layer on stderr plus an optional daily log file.

use anyhow::{Context as _, Result};
use telemon_config::{LogEncoding, TelemonConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, prelude::*};

const LOG_FILE_PREFIX: &str = "telemon.log";

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process.
pub fn init(config: &TelemonConfig, verbose: bool, file: bool) -> Result<Option<WorkerGuard>> {
    let logging = config.logging();
    let level = if verbose {
        "debug".to_string()
    } else {
        logging.level.clone()
    };

    let console_filter =
        EnvFilter::try_new(&level).with_context(|| format!("invalid log level '{level}'"))?;
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(console_filter);

    if !(file && logging.file) {
        tracing_subscriber::registry().with(console).init();
        return Ok(None);
    }

    let log_dir = config.paths().log_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("cannot create log directory {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_filter = EnvFilter::try_new(&level)?;

    match logging.encoding {
        LogEncoding::Json => {
            let file_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(file_filter);
            tracing_subscriber::registry()
                .with(console)
                .with(file_layer)
                .init();
        }
        LogEncoding::Console => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_filter(file_filter);
            tracing_subscriber::registry()
                .with(console)
                .with(file_layer)
                .init();
        }
    }

    Ok(Some(guard))
}
