use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{Log, Metadata, Record};
use mlogconfig_core::{
    BootstrapError, EventSink, HandlerErrors, LogRecord, LogSender, Severity, spawn_log_thread,
};

struct AttachedSink {
    min_severity: Severity,
    sender: LogSender,
}

/// The attached sinks, in attachment order.
pub(crate) struct Registry {
    level: Severity,
    sinks: Vec<AttachedSink>,
    errors: HandlerErrors,
}

impl Registry {
    pub(crate) fn new(level: Severity) -> Self {
        Self {
            level,
            sinks: Vec::new(),
            errors: HandlerErrors::default(),
        }
    }

    /// Starts a writer thread for `sink`. It receives records at or above `min_severity`.
    pub(crate) fn attach(
        &mut self,
        sink: EventSink,
        min_severity: Severity,
    ) -> Result<(), BootstrapError> {
        let kind = sink.kind();
        let sender = spawn_log_thread(sink, self.errors.clone())
            .map_err(|source| BootstrapError::HandlerAttachFailure { kind, source })?;
        self.sinks.push(AttachedSink {
            min_severity,
            sender,
        });
        Ok(())
    }

    pub(crate) fn emit(&self, record: LogRecord) {
        if record.severity < self.level {
            return;
        }
        let record = Arc::new(record);
        for sink in &self.sinks {
            if record.severity >= sink.min_severity {
                sink.sender.send_record(Arc::clone(&record));
            }
        }
    }

    pub(crate) fn warn(&self, message: &str) {
        self.emit(LogRecord::new(Severity::Warning, message));
    }

    fn shutdown(&self) {
        for sink in &self.sinks {
            sink.sender.shutdown();
        }
    }
}

/// An assembled set of sinks, returned by [`crate::setup_logging`].
///
/// Dropping the context flushes every sink and stops its writer thread.
pub struct LoggingContext {
    registry: Arc<Registry>,
    primary_path: PathBuf,
    error_path: Option<PathBuf>,
}

impl LoggingContext {
    pub(crate) fn new(
        registry: Registry,
        primary_path: PathBuf,
        error_path: Option<PathBuf>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            primary_path,
            error_path,
        }
    }

    /// Fans `message` out to every sink whose threshold it meets.
    pub fn emit(&self, severity: Severity, message: impl Into<String>) {
        self.registry.emit(LogRecord::new(severity, message));
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.emit(Severity::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(Severity::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.emit(Severity::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(Severity::Error, message);
    }

    pub fn critical(&self, message: impl Into<String>) {
        self.emit(Severity::Critical, message);
    }

    pub fn level(&self) -> Severity {
        self.registry.level
    }

    /// Kinds of the attached sinks, in attachment order.
    pub fn sinks(&self) -> Vec<&'static str> {
        self.registry
            .sinks
            .iter()
            .map(|sink| sink.sender.kind())
            .collect()
    }

    /// Number of records a sink failed to deliver so far.
    pub fn handler_errors(&self) -> usize {
        self.registry.errors.count()
    }

    pub fn primary_path(&self) -> &Path {
        &self.primary_path
    }

    pub fn error_path(&self) -> Option<&Path> {
        self.error_path.as_deref()
    }

    /// Routes the `log` macros into this context.
    ///
    /// A process has a single `log` logger, so this succeeds at most once per process.
    /// Records logged through the macros after the context is dropped are discarded.
    pub fn install_global(&self) -> Result<(), BootstrapError> {
        log::set_boxed_logger(Box::new(GlobalLogger(Arc::clone(&self.registry))))
            .map_err(|_| BootstrapError::AlreadyInstalled)?;
        log::set_max_level(self.level().to_level_filter());
        Ok(())
    }

    /// Flushes and stops every sink. Later records are discarded.
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }
}

impl Drop for LoggingContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct GlobalLogger(Arc<Registry>);

impl Log for GlobalLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        Severity::from(metadata.level()) >= self.0.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.0.emit(LogRecord::new(
            record.level().into(),
            record.args().to_string(),
        ));
    }

    fn flush(&self) {}
}
