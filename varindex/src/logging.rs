//! Tracing subscriber setup for binaries embedding the index.
//!
//! The library itself only emits `tracing` events. Binaries call
//! [`init_logging`] once at startup; `RUST_LOG` directives take precedence
//! over the given default level.

use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::error::{IndexError, IndexResult};

/// Map a `-v` count to a default level.
pub fn level_for_verbosity(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the global subscriber: compact output on stderr and, when
/// `log_file` is given, a plain-text copy written by a background thread.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the program. A subscriber installed earlier (e.g. by a test
/// harness) is left in place.
pub fn init_logging(level: Level, log_file: Option<&Path>) -> IndexResult<Option<WorkerGuard>> {
    let filter = || EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(filter());

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file_name = path.file_name().ok_or_else(|| {
                IndexError::InvalidConfig(format!("log file path has no file name: {}", path.display()))
            })?;
            let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for_verbosity(0), Level::WARN);
        assert_eq!(level_for_verbosity(2), Level::DEBUG);
        assert_eq!(level_for_verbosity(9), Level::TRACE);
    }

    #[test]
    fn test_log_file_without_name_rejected() {
        assert!(init_logging(Level::INFO, Some(Path::new("/"))).is_err());
    }
}
