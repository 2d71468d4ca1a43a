//! `log` backend that prints through semihosting to the QEMU console.

use cortex_m_semihosting::hprintln;
use log::{Level, LevelFilter, Metadata, Record};

struct SemihostingLogger;

static LOGGER: SemihostingLogger = SemihostingLogger;

impl log::Log for SemihostingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = hprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

pub fn init() {
    // Only fails if a logger is already installed.
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }
}
