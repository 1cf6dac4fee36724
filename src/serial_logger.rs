use log::{Record, Level, Metadata, SetLoggerError, LevelFilter};
use core::fmt::Write as _;
use embassy_time::Instant;

use crate::console;

struct SerialLogger {
    level: Level,
}

impl SerialLogger {
    pub const fn new(level: Level) -> Self {
        Self { level }
    }
}

impl log::Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let millis = Instant::now().as_millis();
        let mut out = console::stdout_get();
        let _ = write!(out, "[{:>6}.{:03}] {:<5} ", millis / 1000, millis % 1000, record.level());
        if record.level() >= Level::Debug {
            let _ = write!(out, "{}: ", record.target());
        }
        let _ = write!(out, "{}\r\n", record.args());
    }

    fn flush(&self) {}
}

static LOGGER: SerialLogger = SerialLogger::new(Level::Info);

pub fn init() -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(LevelFilter::Info))
}
