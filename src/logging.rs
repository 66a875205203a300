//! Structured logging setup
//!
//! Provides:
//! - JSON output for machine consumption
//! - Pretty formatting for development
//! - Daily-rolling log files via `tracing-appender`
//! - `RUST_LOG` overriding the configured level
//!
//! Console logs go to stderr so they never interleave with report output.

use std::path::Path;

use anyhow::{anyhow, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "claude-pulse.log";

/// Initialize the global subscriber.
///
/// Returns the file writer guard when logging to a file; keep it alive for the
/// lifetime of the process or buffered lines are lost.
pub fn init_logging(config: &LoggingConfig, log_dir: &Path) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_ascii_lowercase()));

    match config.output.as_str() {
        "file" => init_file_logging(env_filter, &config.format, log_dir).map(Some),
        "both" => init_combined_logging(env_filter, &config.format, log_dir).map(Some),
        _ => init_console_logging(env_filter, &config.format).map(|_| None),
    }
}

fn init_console_logging(filter: EnvFilter, format: &str) -> Result<()> {
    let subscriber = tracing_subscriber::registry().with(filter);

    let result = match format {
        "json" => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true),
            )
            .try_init(),
        _ => subscriber
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .pretty(),
            )
            .try_init(),
    };

    result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

fn init_file_logging(filter: EnvFilter, format: &str, log_dir: &Path) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry().with(filter);

    let result = match format {
        "json" => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        _ => subscriber
            .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
            .try_init(),
    };

    result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;
    Ok(guard)
}

fn init_combined_logging(filter: EnvFilter, format: &str, log_dir: &Path) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry().with(filter);

    let result = match format {
        "json" => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(fmt::layer().json().with_writer(non_blocking))
            .try_init(),
        _ => subscriber
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .try_init(),
    };

    result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;
    Ok(guard)
}
