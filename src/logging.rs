//! Console sink for the `log` facade.
//!
//! The library only emits records through `log::{debug, info, warn, error}`.
//! The binary, `bibi_helm_open` and the Python constructor call [`init`] with
//! the configured level; records are written to stderr as
//! `[LEVEL] [target] message`.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use log::{Level, LevelFilter, Log, Metadata, Record};

static LOGGER: OnceLock<ConsoleLogger> = OnceLock::new();
static INSTALLED: AtomicBool = AtomicBool::new(false);

pub struct ConsoleLogger{
    level: LevelFilter,
}

impl ConsoleLogger{
    pub fn new(level: LevelFilter) -> Self{
        ConsoleLogger{ level }
    }

    fn level_tag(level: Level) -> &'static str{
        match level{
            Level::Error => "[ERROR]",
            Level::Warn => "[WARN] ",
            Level::Info => "[INFO] ",
            Level::Debug => "[DEBUG]",
            Level::Trace => "[TRACE]",
        }
    }

    pub fn format(record: &Record) -> String{
        format!("{} [{}] {}", Self::level_tag(record.level()), record.target(), record.args())
    }
}

impl Log for ConsoleLogger{
    fn enabled(&self, metadata: &Metadata) -> bool{
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record){
        if !self.enabled(record.metadata()){
            return;
        }
        let line = Self::format(record);
        let _ = writeln!(std::io::stderr().lock(), "{}", line);
    }

    fn flush(&self){
        let _ = std::io::stderr().flush();
    }
}

/// Install the console logger and apply `level`. Safe to call more than once:
/// the logger is installed on the first call and later calls only change the
/// level. If the host already installed its own logger, nothing is touched.
pub fn init(level: LevelFilter){
    //the installed logger passes everything, filtering is log::max_level's job
    let logger = LOGGER.get_or_init(|| ConsoleLogger::new(LevelFilter::Trace));
    if log::set_logger(logger).is_ok(){
        INSTALLED.store(true, Ordering::SeqCst);
    }
    if INSTALLED.load(Ordering::SeqCst){
        log::set_max_level(level);
    }
}

/// Whether [`init`] installed the console logger
pub fn is_installed() -> bool{
    INSTALLED.load(Ordering::SeqCst)
}

/// Parse a level name from configuration, defaulting to `Info`.
pub fn parse_level(name: &str) -> LevelFilter{
    name.parse().unwrap_or(LevelFilter::Info)
}
