use crate::config::LoggingConfig;
use anyhow::Context;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVES: &str = "vehicles_service=info,tower_http=info";

/// Initializes the logging system with both console and file output.
///
/// The returned guard flushes the file writer when dropped, so `main` keeps it
/// alive for the lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<WorkerGuard> {
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender(config)?);

    let file_layer = if config.json {
        fmt::layer()
            .json()
            .with_writer(non_blocking_writer)
            .boxed()
    } else {
        fmt::layer()
            .with_ansi(false)
            .with_writer(non_blocking_writer)
            .boxed()
    };

    let console_layer = fmt::layer().with_writer(std::io::stdout);

    // RUST_LOG wins when set
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    Ok(guard)
}

/// Daily rolling file in the configured directory, created if missing
fn file_appender(config: &LoggingConfig) -> anyhow::Result<RollingFileAppender> {
    fs::create_dir_all(&config.directory)
        .with_context(|| format!("creating log directory {}", config.directory.display()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(config.file_name.clone())
        .build(&config.directory)
        .with_context(|| format!("opening log file in {}", config.directory.display()))
}
