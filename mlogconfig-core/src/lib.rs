//! # mlogconfig-core
//! Core utilities for mlogconfig - path validation, sinks and writer threads.

mod config;
mod error;
mod event_log;
mod log_writer;
mod prompt;
#[cfg(unix)]
mod syslog;
mod utils;
mod validate;

pub use config::MLOGCONFIG_CONFIG;
pub use error::{BootstrapError, EmitError};
pub use event_log::{
    EVENT_ID, EventLogWriter, EventReporter, EventType, default_app_name, native_event_sink,
};
pub use log_writer::{EventSink, LogConsole, LogFile, LogWriter};
pub use prompt::PromptPolicy;
#[cfg(unix)]
pub use syslog::{LOG_USER, SyslogWriter, default_syslog_address, priority};
pub use utils::{
    HandlerErrors, LogMessage, LogRecord, LogSender, ParseSeverityError, Severity, format_log,
    format_log_colored, spawn_log_thread,
};
pub use validate::{
    CONFLICT_RETRY_BUDGET, Conflict, ConflictAction, ConflictKind, ConflictPolicy, FileMode,
    ParseFileModeError, ResolvedPath, ResolvedSink, resolve_log_path, resolve_log_path_with,
    validate_log_file, validate_log_file_with,
};
