// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Providers let the datapath run in different contexts by plugging in
//! implementations of ambient services. Today that is only logging:
//! the driver glue routes it to the host's trace facility, tests and
//! tools print it or hand it to a `slog::Logger`.
//!
//! If a service doesn't have at least two obvious implementations it
//! probably doesn't need to be a provider.

use core::fmt;
use core::fmt::Display;
use core::fmt::Write;

/// The set of all context-specific providers required by a datapath.
pub struct Providers {
    pub log: Box<dyn LogProvider>,
}

impl Providers {
    pub fn new(log: Box<dyn LogProvider>) -> Self {
        Self { log }
    }
}

impl Default for Providers {
    fn default() -> Self {
        Self { log: Box::new(PrintlnLog) }
    }
}

/// A logging provider provides the means to log messages to some
/// destination based on the context the datapath is running in.
///
/// Logging levels are provided by [`LogLevel`]. These levels will map
/// to the underlying provider with varying degrees of success.
pub trait LogProvider: Send + Sync {
    /// Log a message at the specified level.
    fn log(&self, level: LogLevel, msg: &str);

    /// Return `true` if messages at `level` go anywhere. Callers check
    /// this before building a message.
    fn enabled(&self, _level: LogLevel) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum LogLevel {
    Verbose,
    Note,
    Warn,
    Error,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let level_s = match self {
            Self::Verbose => "[VERBOSE]",
            Self::Note => "[NOTE]",
            Self::Warn => "[WARN]",
            Self::Error => "[ERROR]",
        };
        write!(f, "{level_s}")
    }
}

/// Print to stdout. Only [`LogLevel::Note`] and above are printed,
/// which keeps per-packet messages off the datapath.
#[derive(Clone, Copy)]
pub struct PrintlnLog;

impl LogProvider for PrintlnLog {
    fn log(&self, level: LogLevel, msg: &str) {
        if self.enabled(level) {
            println!("{level} {msg}");
        }
    }

    fn enabled(&self, level: LogLevel) -> bool {
        level >= LogLevel::Note
    }
}

/// Route datapath logging into a `slog::Logger`.
#[cfg(feature = "slog")]
pub struct SlogLog {
    log: slog::Logger,
}

#[cfg(feature = "slog")]
impl SlogLog {
    pub fn new(log: slog::Logger) -> Self {
        Self { log }
    }
}

#[cfg(feature = "slog")]
impl LogProvider for SlogLog {
    fn log(&self, level: LogLevel, msg: &str) {
        match level {
            LogLevel::Verbose => slog::debug!(self.log, "{}", msg),
            LogLevel::Note => slog::info!(self.log, "{}", msg),
            LogLevel::Warn => slog::warn!(self.log, "{}", msg),
            LogLevel::Error => slog::error!(self.log, "{}", msg),
        }
    }
}

/// Bytes per line of a [`log_hex`] dump.
pub const HEX_LINE_BYTES: usize = 32;

/// Log `buf` as a hex dump, [`HEX_LINE_BYTES`] to a line, each line
/// prefixed with `prefix` and the offset of its first byte.
pub fn log_hex(
    log: &dyn LogProvider,
    level: LogLevel,
    prefix: &str,
    buf: &[u8],
) {
    if !log.enabled(level) {
        return;
    }

    let mut line =
        String::with_capacity(prefix.len() + 8 + HEX_LINE_BYTES * 3);

    for (i, chunk) in buf.chunks(HEX_LINE_BYTES).enumerate() {
        line.clear();
        // Writing into a String cannot fail.
        let _ = write!(line, "{prefix} {:04x}:", i * HEX_LINE_BYTES);
        for b in chunk {
            let _ = write!(line, " {b:02x}");
        }
        log.log(level, &line);
    }
}
