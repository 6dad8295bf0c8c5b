//! Minimal `log` backend for host builds: one line per record on stderr.

use std::io::Write;

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

static LOGGER: ConsoleLogger = ConsoleLogger;

/// Writes `LEVEL target: message` to stderr.
pub struct ConsoleLogger;

impl ConsoleLogger {
    /// Install as the global logger.  Fails if a logger is already set.
    pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_logger(&LOGGER)?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "E",
            Level::Warn => "W",
            Level::Info => "I",
            Level::Debug => "D",
            Level::Trace => "T",
        };
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{tag} ({}) {}", record.target(), record.args());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}
