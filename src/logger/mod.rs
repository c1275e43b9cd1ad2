//! Log-file setup: `tracing` events go to the configured log file as plain
//! timestamped lines, falling back to stderr when the file is not writable.

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::core::config::LoggingConfig;

/// Where log output ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSink {
    File,
    Stderr,
    /// A global subscriber was already installed.
    AlreadyInitialized,
}

fn open_appender(path: &Path) -> std::io::Result<RollingFileAppender> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "log path has no file name")
    })?;
    std::fs::create_dir_all(dir)?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)
        .map_err(std::io::Error::other)
}

fn filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("debug"))
}

/// Install the global subscriber. Safe to call more than once.
pub fn init(log_file: &Path, logging: &LoggingConfig) -> LogSink {
    match open_appender(log_file) {
        Ok(appender) => {
            let layer = fmt::layer()
                .with_writer(appender)
                .with_ansi(false)
                .with_target(false);
            match tracing_subscriber::registry()
                .with(filter(logging))
                .with(layer)
                .try_init()
            {
                Ok(()) => LogSink::File,
                Err(_) => LogSink::AlreadyInitialized,
            }
        }
        Err(e) => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_target(false);
            match tracing_subscriber::registry()
                .with(filter(logging))
                .with(layer)
                .try_init()
            {
                Ok(()) => {
                    tracing::warn!(
                        path = %log_file.display(),
                        error = %e,
                        "cannot open log file; logging to stderr"
                    );
                    LogSink::Stderr
                }
                Err(_) => LogSink::AlreadyInitialized,
            }
        }
    }
}
