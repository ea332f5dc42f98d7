use std::{
    fmt,
    str::FromStr,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use chrono::{DateTime, Local};
use colored::Colorize;
use crossbeam_channel::{RecvTimeoutError, Sender, unbounded};
use log::{Level, LevelFilter};
use thiserror::Error;

use crate::{
    config::MLOGCONFIG_CONFIG,
    error::EmitError,
    log_writer::{EventSink, LogWriter},
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Record severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }

    /// The `log` facade has no critical level, so it shares `Error`.
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            Severity::Debug => LevelFilter::Debug,
            Severity::Info => LevelFilter::Info,
            Severity::Warning => LevelFilter::Warn,
            Severity::Error | Severity::Critical => LevelFilter::Error,
        }
    }
}

impl From<Level> for Severity {
    fn from(level: Level) -> Self {
        match level {
            Level::Error => Severity::Error,
            Level::Warn => Severity::Warning,
            Level::Info => Severity::Info,
            Level::Debug | Level::Trace => Severity::Debug,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown log level {0:?}")]
pub struct ParseSeverityError(String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" | "fatal" => Ok(Severity::Critical),
            _ => Err(ParseSeverityError(s.into())),
        }
    }
}

/// A single log record, timestamped when it is emitted rather than when it is written.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    pub message: String,
}

impl LogRecord {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            severity,
            message: message.into(),
        }
    }
}

/// Messages consumed by a writer thread.
#[derive(Debug, Clone)]
pub enum LogMessage {
    Record(Arc<LogRecord>),
    Shutdown,
}

/// Renders `YYYY-MM-DD HH:MM:SS - LEVEL: message`.
pub fn format_log(record: &LogRecord) -> String {
    let time = record.timestamp.format(TIMESTAMP_FORMAT);
    format!("{time} - {}: {}", record.severity, record.message)
}

/// Same layout as [`format_log`] with the level name coloured for terminals.
///
/// `colored` decides on its own whether to emit escape codes, from stdout and the
/// `NO_COLOR`/`CLICOLOR*` variables. With stdout redirected the level stays plain even on a
/// console sink asked for colour; `CLICOLOR_FORCE=1` forces it.
pub fn format_log_colored(record: &LogRecord) -> String {
    let time = record.timestamp.format(TIMESTAMP_FORMAT);
    let level = match record.severity {
        Severity::Critical => "CRITICAL".bright_red().bold(),
        Severity::Error => "ERROR".red(),
        Severity::Warning => "WARNING".yellow(),
        Severity::Info => "INFO".green(),
        Severity::Debug => "DEBUG".blue(),
    };
    format!("{time} - {level}: {}", record.message)
}

/// Counts records a sink failed to deliver.
///
/// Sink failures never propagate to the code that logged the record. Each one is
/// counted here and reported on stderr.
#[derive(Debug, Clone, Default)]
pub struct HandlerErrors(Arc<AtomicUsize>);

impl HandlerErrors {
    pub fn record(&self, sink: &str, error: &EmitError) {
        self.0.fetch_add(1, Ordering::Relaxed);
        eprintln!("--- Logging error in {sink} sink: {error}");
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct LogSender {
    kind: &'static str,
    sender: Sender<LogMessage>,
    handler: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for LogSender {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl LogSender {
    pub fn new(kind: &'static str, sender: Sender<LogMessage>, handler: JoinHandle<()>) -> Self {
        Self {
            kind,
            sender,
            handler: Mutex::new(Some(handler)),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Queues a record. Records sent after shutdown are dropped.
    pub fn send_record(&self, record: Arc<LogRecord>) {
        self.sender.send(LogMessage::Record(record)).ok();
    }

    /// Flushes pending records and joins the writer thread. Safe to call more than once.
    pub fn shutdown(&self) {
        let mut guard = self.handler.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = guard.take() {
            self.sender.send(LogMessage::Shutdown).ok();
            if handle.join().is_err() {
                eprintln!("--- Logging error: {} writer thread panicked", self.kind);
            }
        }
    }
}

/// Spawns the writer thread owning `sink` and returns the sending half.
pub fn spawn_log_thread(mut sink: EventSink, errors: HandlerErrors) -> std::io::Result<LogSender> {
    let kind = sink.kind();
    let (sender, receiver) = unbounded::<LogMessage>();
    let handler = std::thread::Builder::new()
        .name(format!("mlogconfig-{kind}"))
        .spawn(move || {
            let batch_size = MLOGCONFIG_CONFIG.BATCH_SIZE.max(1) as usize;
            let mut batch = Vec::with_capacity(batch_size);
            let flush_interval = Duration::from_millis(MLOGCONFIG_CONFIG.FLUSH_INTERVAL_MS);
            let mut last_flush = Instant::now();
            loop {
                let elapsed = last_flush.elapsed();
                let timeout = if elapsed >= flush_interval {
                    Duration::from_millis(1)
                } else {
                    flush_interval - elapsed
                };

                match receiver.recv_timeout(timeout) {
                    Ok(msg) => {
                        batch.push(msg);
                        while let Ok(msg) = receiver.try_recv() {
                            batch.push(msg);
                            if batch.len() >= batch_size {
                                break;
                            }
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        if last_flush.elapsed() >= flush_interval {
                            flush_sink(&mut sink, &errors);
                            last_flush = Instant::now();
                        }
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        flush_sink(&mut sink, &errors);
                        break;
                    }
                }

                let mut should_shutdown = false;
                for message in batch.drain(..) {
                    match message {
                        LogMessage::Shutdown => {
                            should_shutdown = true;
                            break;
                        }
                        LogMessage::Record(record) => write_to_sink(&mut sink, &record, &errors),
                    }
                }

                if should_shutdown || last_flush.elapsed() >= flush_interval {
                    flush_sink(&mut sink, &errors);
                    last_flush = Instant::now();
                }

                if should_shutdown {
                    break;
                }
            }
        })?;
    Ok(LogSender::new(kind, sender, handler))
}

fn write_to_sink(sink: &mut EventSink, record: &LogRecord, errors: &HandlerErrors) {
    match sink.write_record(record) {
        Ok(()) => {}
        Err(error @ EmitError::DestinationMissing(_)) => {
            errors.record(sink.kind(), &error);
            eprintln!("--- {} sink disabled", sink.kind());
            sink.disable();
        }
        Err(error) => errors.record(sink.kind(), &error),
    }
}

fn flush_sink(sink: &mut EventSink, errors: &HandlerErrors) {
    if let Err(error) = sink.flush() {
        errors.record(sink.kind(), &error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_writer::{LogFile, LogWriter};
    use chrono::NaiveDateTime;

    #[test]
    fn test_format_log_layout() {
        let record = LogRecord::new(Severity::Warning, "disk almost full");
        let line = format_log(&record);
        let (time, rest) = line.split_at(19);
        assert!(NaiveDateTime::parse_from_str(time, TIMESTAMP_FORMAT).is_ok());
        assert_eq!(rest, " - WARNING: disk almost full");
    }

    #[test]
    fn test_format_log_colored_when_forced() {
        colored::control::set_override(true);
        let line = format_log_colored(&LogRecord::new(Severity::Warning, "disk almost full"));
        colored::control::unset_override();
        assert!(line.contains("\x1b[33mWARNING\x1b[0m"));
        assert!(line.ends_with(": disk almost full"));
    }

    #[test]
    fn test_severity_from_log_level() {
        assert_eq!(Severity::from(Level::Trace), Severity::Debug);
        assert_eq!(Severity::from(Level::Warn), Severity::Warning);
        assert_eq!(Severity::from(Level::Error), Severity::Error);
        assert!(Severity::Critical > Severity::Error);
        assert!(Severity::Debug < Severity::Info);
        assert_eq!(Severity::Critical.to_level_filter(), LevelFilter::Error);
    }

    #[test]
    fn test_parse_severity() {
        assert_eq!("WARNING".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!("warn".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!("Critical".parse::<Severity>(), Ok(Severity::Critical));
        let err = "verbose".parse::<Severity>().unwrap_err();
        assert_eq!(err.to_string(), "unknown log level \"verbose\"");
    }

    #[test]
    fn test_spawn_log_thread_flushes_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thread.log");
        let file = std::fs::File::create(&path).unwrap();
        let sink = EventSink::File(LogFile::new(file));
        let sender = spawn_log_thread(sink, HandlerErrors::default()).unwrap();
        assert_eq!(sender.kind(), "file");
        for i in 0..50 {
            sender.send_record(Arc::new(LogRecord::new(Severity::Info, format!("msg{i}"))));
        }
        sender.shutdown();
        // a second shutdown is a no-op and later records are discarded
        sender.shutdown();
        sender.send_record(Arc::new(LogRecord::new(Severity::Info, "too late")));

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 50);
        assert!(lines[0].ends_with(" - INFO: msg0"));
        assert!(lines[49].ends_with(" - INFO: msg49"));
    }

    #[test]
    fn test_null_sink_accepts_everything() {
        let mut sink = EventSink::Null;
        assert_eq!(sink.kind(), "null");
        assert!(
            sink.write_record(&LogRecord::new(Severity::Critical, "ignored"))
                .is_ok()
        );
        assert!(sink.flush().is_ok());
    }
}
