//! Console logger for hosted builds.
//!
//! Every record is one line on stderr with a coloured level tag.

use log::{Level, LevelFilter, Metadata, Record};
use std::io::Write;

/// Console logger: one coloured line per record on stderr.
struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let (level_str, msg_color) = match record.level() {
                Level::Error => ("\x1b[31mERROR\x1b[0m", "\x1b[31m"),
                Level::Warn => ("\x1b[33mWARN\x1b[0m", "\x1b[33m"),
                Level::Info => ("\x1b[32mINFO\x1b[0m", "\x1b[37m"),
                Level::Debug => ("\x1b[90mDEBUG\x1b[0m", "\x1b[90m"),
                Level::Trace => ("\x1b[90mTRACE\x1b[0m", "\x1b[90m"),
            };

            let _ = writeln!(
                std::io::stderr().lock(),
                "[{}] {}{}\x1b[0m",
                level_str,
                msg_color,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Install the console logger at `Info` level.
///
/// Safe to call more than once; later calls leave the installed logger in
/// place.
pub fn init() {
    init_with_level(LevelFilter::Info);
}

pub fn init_with_level(level: LevelFilter) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
