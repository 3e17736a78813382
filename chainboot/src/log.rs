//! Logging setup.
//!
//! Installs a `tracing-subscriber` stack writing to stderr and, when a log
//! directory is configured, to `chainboot.log` through a non-blocking
//! `tracing-appender` writer. `RUST_LOG` overrides the configured level.

use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingSection;

/// Name of the log file inside the configured directory.
pub const LOG_FILE_NAME: &str = "chainboot.log";

/// Keeps the file writer flushing until dropped.
///
/// Hold this for the lifetime of the program.
#[must_use]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
    /// Path of the log file, if file logging is active.
    pub log_file: Option<PathBuf>,
}

/// Install the global subscriber.
pub fn init_logging(settings: &LoggingSection) -> io::Result<LoggingGuard> {
    let filter = build_filter(&settings.level);

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_timer(LocalTime::rfc_3339())
        .with_target(false);

    let (file_layer, file_guard, log_file) = match &settings.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_timer(LocalTime::rfc_3339())
                .with_ansi(false);
            (Some(layer), Some(guard), Some(log_file_path(dir)))
        }
        None => (None, None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| io::Error::other(e.to_string()))?;

    Ok(LoggingGuard {
        _file: file_guard,
        log_file,
    })
}

/// Path of the log file for a log directory.
pub fn log_file_path(dir: &Path) -> PathBuf {
    dir.join(LOG_FILE_NAME)
}

/// `RUST_LOG` if set, else the configured level, else `info`.
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_path() {
        let path = log_file_path(Path::new("/var/log/chainboot"));
        assert_eq!(path, PathBuf::from("/var/log/chainboot/chainboot.log"));
    }

    #[test]
    fn test_invalid_level_falls_back() {
        // An unparsable directive must not panic.
        let _filter = build_filter("[[not a filter");
    }
}
