//! Structured logging for the bridge
//!
//! A small `log::Log` implementation with timestamps, an optional log file,
//! and per-category debug output. Tests and quick CLI runs can use
//! [`init_test_logging`] instead, which goes through `env_logger`.

use chrono::Local;
use log::{Level, LevelFilter, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Mutex, Once, RwLock};

use crate::config::{BridgeConfig, DebugCategories, LogLevel};

/// Timestamp format for log entries
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

static INIT_LOGGER: Once = Once::new();

static DEBUG_FLAGS: RwLock<DebugCategories> = RwLock::new(DebugCategories {
    simulation: false,
    gatt: false,
    protocol: false,
    harness: false,
    all: false,
});

/// Logger writing to stderr and/or a file
pub struct BridgeLogger {
    file: Option<Mutex<File>>,
    level: LevelFilter,
    console_output: bool,
}

impl log::Log for BridgeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        if metadata.level() > self.level {
            return false;
        }
        if metadata.level() == Level::Debug {
            return should_log_debug(metadata.target());
        }
        true
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let timestamp = Local::now().format(TIMESTAMP_FORMAT);
        let module = record.module_path().unwrap_or("<unknown>");
        let entry = format!(
            "[{}] {:<5} [{}] {}\n",
            timestamp,
            record.level(),
            module,
            record.args()
        );

        if self.console_output {
            let _ = io::stderr().write_all(entry.as_bytes());
        }

        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.write_all(entry.as_bytes());
            }
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
    }
}

fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Error => LevelFilter::Error,
        LogLevel::Warn => LevelFilter::Warn,
        LogLevel::Info => LevelFilter::Info,
        LogLevel::Debug => LevelFilter::Debug,
        LogLevel::Trace => LevelFilter::Trace,
    }
}

/// Configure logging with the specified level and optionally a log file.
///
/// Only the first call installs a logger; later calls are no-ops.
pub fn configure_logging(
    level: LogLevel,
    log_file: Option<PathBuf>,
    console_output: bool,
) -> Result<(), String> {
    let mut result = Ok(());

    INIT_LOGGER.call_once(|| {
        let filter = level_filter(level);

        let file = match log_file.as_ref() {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        if let Err(e) = std::fs::create_dir_all(parent) {
                            result = Err(format!("Failed to create log directory: {}", e));
                            return;
                        }
                    }
                }
                match OpenOptions::new().create(true).append(true).open(path) {
                    Ok(file) => Some(Mutex::new(file)),
                    Err(e) => {
                        result = Err(format!("Failed to open log file: {}", e));
                        return;
                    }
                }
            }
            None => None,
        };

        let logger = Box::new(BridgeLogger {
            file,
            level: filter,
            console_output,
        });

        if let Err(e) = log::set_boxed_logger(logger) {
            result = Err(format!("Failed to set logger: {}", e));
            return;
        }
        log::set_max_level(filter);

        log::info!("Logging initialized at level: {}", level);
        if let Some(path) = log_file {
            log::info!("Log file: {}", path.display());
        }
    });

    result
}

/// Configure logging from a [`BridgeConfig`]
pub fn init_logger(config: &BridgeConfig) -> Result<(), String> {
    set_debug_flags(config.debug.clone());
    configure_logging(config.log_level, config.log_file.clone(), config.console_logging)
}

/// Install an `env_logger` suitable for tests (honours `RUST_LOG`)
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Set global debug categories
pub fn set_debug_flags(flags: DebugCategories) {
    if let Ok(mut debug_flags) = DEBUG_FLAGS.write() {
        *debug_flags = flags;
    }
}

/// Check whether debug output from `module_path` is enabled
pub fn should_log_debug(module_path: &str) -> bool {
    if let Ok(flags) = DEBUG_FLAGS.read() {
        if flags.all {
            return true;
        }
        if module_path.contains("::simulation") || module_path.contains("::bridge") {
            return flags.simulation;
        }
        if module_path.contains("::bluetooth") || module_path.contains("::fixtures") {
            return flags.gatt;
        }
        if module_path.contains("::protocol") {
            return flags.protocol;
        }
        if module_path.contains("::harness") || module_path.contains("::conformance") {
            return flags.harness;
        }
    }
    false
}

/// Times an operation and logs its duration at debug level
pub struct PerformanceLogger {
    component: String,
    operation: String,
    start_time: std::time::Instant,
}

impl PerformanceLogger {
    pub fn new<S: Into<String>>(component: S, operation: S) -> Self {
        Self {
            component: component.into(),
            operation: operation.into(),
            start_time: std::time::Instant::now(),
        }
    }

    /// Finish timing and log result
    pub fn finish(self) -> std::time::Duration {
        let duration = self.start_time.elapsed();
        log::debug!(
            "[{}::{}] Operation completed in {:?}",
            self.component,
            self.operation,
            duration
        );
        duration
    }
}
