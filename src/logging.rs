//! # Structured Logging and the Task Outcome Log
//!
//! Two distinct sinks live here:
//!
//! 1. Diagnostic logging via `tracing`, initialized once per process with
//!    an env-filter (`RUST_LOG`). Set `TASKMILL_LOG_JSON=1` for JSON
//!    output.
//! 2. The task outcome log: one line per completed or failed task,
//!    written to stdout by default or to an append-only file when
//!    configured. This is the access-log-style record the worker pool
//!    emits, separate from diagnostics.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use chrono::Local;
use parking_lot::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::{Result, TaskmillError};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize diagnostic logging with env-filter configuration.
///
/// Safe to call more than once; only the first call installs the
/// subscriber. If a global subscriber is already set (e.g. by the host
/// application) this is a no-op.
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let json_output = std::env::var("TASKMILL_LOG_JSON").map(|v| v == "1").unwrap_or(false);

        let installed = if json_output {
            tracing_subscriber::registry()
                .with(fmt::layer().json().with_target(true).with_filter(filter))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_filter(filter))
                .try_init()
        };

        if installed.is_err() {
            tracing::debug!("global tracing subscriber already initialized, continuing");
        }
    });
}

/// Destination for per-task outcome lines.
///
/// Format: `<taskName> [<D/Mon/YYYY:HH:MM:SS -ZZZZ>] <status> <elapsedMs>`
/// with the timestamp in local time. Status is 200 for a successful
/// invocation and 500 for an isolated failure.
pub struct TaskLogSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl TaskLogSink {
    /// Sink writing to standard output (the default).
    pub fn stdout() -> Self {
        Self {
            writer: Mutex::new(Box::new(io::stdout())),
        }
    }

    /// Sink appending to a file, created if missing.
    pub fn append_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(Box::new(file)),
        })
    }

    /// Build the sink a config asks for: a file path, or stdout.
    pub fn from_config(task_log_file: Option<&str>) -> Result<Self> {
        match task_log_file {
            Some(path) => Self::append_file(path).map_err(|e| {
                TaskmillError::ConfigurationError(format!("cannot open task log {path}: {e}"))
            }),
            None => Ok(Self::stdout()),
        }
    }

    /// Write one outcome line. Write failures are logged, never raised:
    /// a broken log sink must not take down the worker loop.
    pub fn record(&self, task_name: &str, status: u16, elapsed: Duration) {
        let timestamp = Local::now().format("%-d/%b/%Y:%H:%M:%S %z");
        let line = format!(
            "{} [{}] {} {}\n",
            task_name,
            timestamp,
            status,
            elapsed.as_millis()
        );

        let mut writer = self.writer.lock();
        if let Err(e) = writer.write_all(line.as_bytes()).and_then(|()| writer.flush()) {
            tracing::error!(task = task_name, error = %e, "task log write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn records_outcome_line_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task.log");

        let sink = TaskLogSink::append_file(&path).unwrap();
        sink.record("send_email", 200, Duration::from_millis(42));
        sink.record("send_email", 500, Duration::from_millis(7));

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        assert!(lines[0].starts_with("send_email ["));
        assert!(lines[0].ends_with(" 200 42"));
        assert!(lines[1].ends_with(" 500 7"));

        // Timestamp sits between brackets and carries a UTC offset.
        let open = lines[0].find('[').unwrap();
        let close = lines[0].find(']').unwrap();
        let stamp = &lines[0][open + 1..close];
        assert!(stamp.contains(':'));
        assert!(stamp.contains('+') || stamp.contains('-'));
    }

    #[test]
    fn appends_rather_than_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task.log");

        TaskLogSink::append_file(&path)
            .unwrap()
            .record("first", 200, Duration::from_millis(1));
        TaskLogSink::append_file(&path)
            .unwrap()
            .record("second", 200, Duration::from_millis(2));

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
