// macb-pci logging
// `log` facade backend feeding a bounded in-memory ring and optional host outputs

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use lazy_static::lazy_static;
use spin::Mutex;

use crate::config::{DEFAULT_LOG_LEVEL, LOG_RING_CAPACITY};

/// Log levels for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace => LogLevel::Trace,
            log::Level::Debug => LogLevel::Debug,
            log::Level::Info => LogLevel::Info,
            log::Level::Warn => LogLevel::Warn,
            log::Level::Error => LogLevel::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Log entry structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Position in the stream of accepted entries
    pub sequence: u64,
    pub level: LogLevel,
    pub target: String,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: &str, message: String) -> Self {
        Self {
            sequence: 0,
            level,
            target: target.to_string(),
            message,
            file: None,
            line: None,
        }
    }

    pub fn with_location(mut self, file: &str, line: u32) -> Self {
        self.file = Some(file.to_string());
        self.line = Some(line);
        self
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:6}] {:5} {:10} ", self.sequence, self.level, self.target)?;

        if let (Some(file), Some(line)) = (&self.file, self.line) {
            write!(f, "{}:{} ", file, line)?;
        }

        write!(f, "{}", self.message)
    }
}

/// Log output targets
pub trait LogOutput: Send + Sync {
    fn write_log(&mut self, entry: &LogEntry);
    fn flush(&mut self);
    fn name(&self) -> &str;
}

/// Memory buffer log output, oldest entries evicted first
pub struct MemoryLogOutput {
    buffer: VecDeque<LogEntry>,
    max_entries: usize,
}

impl MemoryLogOutput {
    pub fn new(max_entries: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(max_entries),
            max_entries,
        }
    }

    pub fn get_entries(&self) -> Vec<LogEntry> {
        self.buffer.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl LogOutput for MemoryLogOutput {
    fn write_log(&mut self, entry: &LogEntry) {
        if self.max_entries == 0 {
            return;
        }
        if self.buffer.len() >= self.max_entries {
            self.buffer.pop_front();
        }
        self.buffer.push_back(entry.clone());
    }

    fn flush(&mut self) {
        // Memory buffer doesn't need flushing
    }

    fn name(&self) -> &str {
        "Memory"
    }
}

/// Main logging system
pub struct Logger {
    memory: MemoryLogOutput,
    outputs: Vec<Box<dyn LogOutput>>,
    min_level: LogLevel,
    enabled: bool,
    next_sequence: u64,
}

impl Logger {
    /// A logger filtering at [`DEFAULT_LOG_LEVEL`]
    pub fn new(ring_capacity: usize) -> Self {
        let default = DEFAULT_LOG_LEVEL.to_level();
        Self {
            memory: MemoryLogOutput::new(ring_capacity),
            outputs: Vec::new(),
            min_level: default.map_or(LogLevel::Error, LogLevel::from),
            enabled: default.is_some(),
            next_sequence: 0,
        }
    }

    /// Forward entries to a host sink (console, serial) as well
    pub fn add_output(&mut self, output: Box<dyn LogOutput>) {
        self.outputs.push(output);
    }

    pub fn set_min_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn log(&mut self, mut entry: LogEntry) {
        if !self.enabled || entry.level < self.min_level {
            return;
        }

        entry.sequence = self.next_sequence;
        self.next_sequence += 1;

        self.memory.write_log(&entry);
        for output in &mut self.outputs {
            output.write_log(&entry);
        }
    }

    pub fn flush(&mut self) {
        for output in &mut self.outputs {
            output.flush();
        }
    }

    pub fn get_memory_logs(&self) -> Vec<LogEntry> {
        self.memory.get_entries()
    }

    pub fn clear_memory_logs(&mut self) {
        self.memory.clear();
    }
}

lazy_static! {
    pub static ref LOGGER: Mutex<Logger> = Mutex::new(Logger::new(LOG_RING_CAPACITY));
}

/// `log` crate backend forwarding every record to [`LOGGER`]
pub struct BridgeLog;

static BRIDGE_LOG: BridgeLog = BridgeLog;

impl log::Log for BridgeLog {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut entry = LogEntry::new(record.level().into(), record.target(), format!("{}", record.args()));
        if let (Some(file), Some(line)) = (record.file(), record.line()) {
            entry = entry.with_location(file, line);
        }
        LOGGER.lock().log(entry);
    }

    fn flush(&self) {
        LOGGER.lock().flush();
    }
}

/// Install the backend for the `log` facade.
///
/// Fails if the host already installed another logger.
pub fn init_logging(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    log::set_logger(&BRIDGE_LOG)?;
    log::set_max_level(level);

    if let Some(level) = level.to_level() {
        LOGGER.lock().set_min_level(level.into());
    }
    Ok(())
}

/// Add a host output to the global logger
pub fn add_output(output: Box<dyn LogOutput>) {
    LOGGER.lock().add_output(output);
}

/// Enable or disable logging
pub fn set_logging_enabled(enabled: bool) {
    LOGGER.lock().set_enabled(enabled);
}

/// Get recent log entries from memory buffer
pub fn get_recent_logs() -> Vec<LogEntry> {
    LOGGER.lock().get_memory_logs()
}

/// Flush all log outputs
pub fn flush_logs() {
    LOGGER.lock().flush();
}
