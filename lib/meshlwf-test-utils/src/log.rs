// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Logging for tests.
use meshlwf::ddi::sync::KMutex;
use meshlwf::provider::LogLevel;
use meshlwf::provider::LogProvider;
use meshlwf::provider::SlogLog;
use slog::Drain;
use std::sync::Arc;

/// Build a terminal logger filtered by `RUST_LOG`.
pub fn test_logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::new(drain);
    let drain = slog_async::Async::new(drain).build().fuse();
    slog::Logger::root(drain, slog::o!("component" => "meshlwf-test"))
}

/// A [`LogProvider`] recording every line, and echoing it to a
/// [`test_logger`].
///
/// Clones share the same record.
#[derive(Clone)]
pub struct CaptureLog {
    lines: Arc<KMutex<Vec<(LogLevel, String)>>>,
    echo: Option<Arc<SlogLog>>,
}

impl Default for CaptureLog {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureLog {
    pub fn new() -> Self {
        Self { lines: Arc::new(KMutex::new(vec![])), echo: None }
    }

    /// Also send every line to `log`.
    pub fn with_echo(log: slog::Logger) -> Self {
        Self {
            lines: Arc::new(KMutex::new(vec![])),
            echo: Some(Arc::new(SlogLog::new(log))),
        }
    }

    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().clone()
    }

    /// The number of lines logged at `level`.
    pub fn count(&self, level: LogLevel) -> usize {
        self.lines.lock().iter().filter(|(l, _)| *l == level).count()
    }

    /// Return `true` if a line at `level` contains `needle`.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.lines
            .lock()
            .iter()
            .any(|(l, msg)| *l == level && msg.contains(needle))
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl LogProvider for CaptureLog {
    fn log(&self, level: LogLevel, msg: &str) {
        if let Some(echo) = &self.echo {
            echo.log(level, msg);
        }
        self.lines.lock().push((level, msg.to_string()));
    }
}
