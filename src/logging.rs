//! Tracing setup for the porch binary.
//!
//! Console output goes to stderr in every mode, filtered by `RUST_LOG`
//! (default `info`). When the configuration names a logs directory the
//! same events are additionally written as JSON lines to a
//! daily-rotated file, so a long-running gateway keeps a
//! machine-parseable history while one-shot subcommands stay
//! console-only.

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Rotated log files are named `<prefix>.YYYY-MM-DD`; the prefix tracks
/// the crate name so repackaged builds keep distinct files.
const LOG_FILE_PREFIX: &str = concat!(env!("CARGO_PKG_NAME"), ".log");

/// Keeps the non-blocking file writer alive.
///
/// Dropping the guard flushes buffered entries and closes the current
/// log file, so it must outlive every span and event the process
/// emits. When no file logging was requested the guard holds nothing.
#[must_use]
pub struct LoggingGuard {
    _file_writer: Option<WorkerGuard>,
}

/// Install the process-wide subscriber.
///
/// With `logs_dir` set, events are written both to stderr and to a
/// daily-rotated JSON file inside that directory; without it, stderr
/// only.
///
/// # Errors
///
/// Returns an error if the logs directory cannot be created.
pub fn init(logs_dir: Option<&Path>) -> anyhow::Result<LoggingGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter).with(console);

    let Some(dir) = logs_dir else {
        registry.init();
        return Ok(LoggingGuard { _file_writer: None });
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create logs directory {}", dir.display()))?;

    let roller = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(roller);
    registry
        .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
        .init();

    Ok(LoggingGuard {
        _file_writer: Some(guard),
    })
}
