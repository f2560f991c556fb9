//! Logging setup.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

const DEFAULT_LOG_FILE: &str = "oi-trader.log";

/// Split a log file path into the directory the daily roller writes to and
/// the file name prefix.
fn split_log_path(path: &Path) -> (&Path, &str) {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE);
    (dir, name)
}

/// Setup logging with the given level.
///
/// `RUST_LOG` overrides `level`. With `file` set, events are also written
/// to a daily-rolling file; keep the returned guard alive until exit so
/// buffered lines are flushed.
pub fn setup_logging(level: &str, json: bool, file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers: Vec<BoxedLayer> = vec![if json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().pretty().boxed()
    }];

    let guard = file.map(|path| {
        let (dir, name) = split_log_path(path);
        let appender = tracing_appender::rolling::daily(dir, name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(if json {
            fmt::layer().json().with_writer(writer).boxed()
        } else {
            fmt::layer().with_ansi(false).with_writer(writer).boxed()
        });
        guard
    });

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .init();

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("logs/trader.log"));
        assert_eq!(dir, Path::new("logs"));
        assert_eq!(name, "trader.log");

        let (dir, name) = split_log_path(Path::new("trader.log"));
        assert_eq!(dir, Path::new("."));
        assert_eq!(name, "trader.log");
    }
}
