//! Logging infrastructure for infovid.
//!
//! This module provides:
//! - Global `tracing` subscriber setup (stderr, optional rolling file)
//! - Per-workflow loggers writing `{logs_dir}/{workflow_id}.log`
//! - Compact mode with progress filtering
//! - Tail buffer for error diagnosis
//!
//! # Example
//!
//! ```no_run
//! use infovid_core::logging::{LogConfig, WorkflowLogger};
//!
//! let logger = WorkflowLogger::new("4f1c...", "/path/to/logs", LogConfig::default()).unwrap();
//!
//! logger.phase("generate-script");
//! logger.progress("generate-script", 50);
//! logger.success("Script ready");
//! ```

mod types;
mod workflow_logger;

pub use types::{LogConfig, LogLevel, MessagePrefix};
pub use workflow_logger::WorkflowLogger;
pub(crate) use workflow_logger::sanitize_filename;

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Respects `RUST_LOG`, falling back to the provided default level, and
/// writes to stderr. Call once at startup.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .try_init();
}

/// Initialize tracing with an additional daily-rolling log file in `log_dir`.
///
/// The returned guard flushes the background writer on drop and must be
/// kept alive for the lifetime of the process.
pub fn init_tracing_with_file(
    default_level: LogLevel,
    log_dir: impl AsRef<Path>,
) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir.as_ref())?;

    let appender = tracing_appender::rolling::daily(log_dir.as_ref(), "infovid.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .with(filter)
        .try_init();

    Ok(guard)
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
