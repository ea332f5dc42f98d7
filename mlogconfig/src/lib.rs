//! # mlogconfig
//! Logging bootstrap: one call validates the log files and fans every record out to a
//! primary log file, an optional error-only log file, the console, syslog and the
//! native event log.
//!
//! ## Usage
//! ```toml
//! // Cargo.toml
//! ...
//! [dependencies]
//! mlogconfig = "0.3.0"
//! ```
//!
//! ```rust
//! use mlogconfig::{Severity, logger_config};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let ctx = logger_config(dir.path().join("run.log"))
//!     .with_error_log(dir.path().join("run.err"))
//!     .with_level(Severity::Debug)
//!     .setup()
//!     .expect("Unable to set up logging");
//!
//! ctx.info("Hello, world!");
//! ctx.error("Something broke");
//! drop(ctx); // flushes every sink
//!
//! let errors = std::fs::read_to_string(dir.path().join("run.err")).unwrap();
//! assert!(errors.ends_with(" - ERROR: Something broke\n"));
//! ```
//!
//! Every line has the form `YYYY-MM-DD HH:MM:SS - LEVEL: message`.
//!
//! ## Using the `log` macros
//! A context can be installed once per process as the `log` facade logger.
//!
//! ```rust
//! use mlogconfig::logger_config;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let ctx = logger_config(dir.path().join("app.log"))
//!     .setup()
//!     .unwrap();
//! ctx.install_global().unwrap();
//!
//! log::info!("Hello from the facade");
//! drop(ctx);
//!
//! let log = std::fs::read_to_string(dir.path().join("app.log")).unwrap();
//! assert!(log.ends_with(" - INFO: Hello from the facade\n"));
//! ```
//!
//! ## File modes
//! Log files are appended to by default. [`FileMode::Overwrite`] truncates them and
//! [`FileMode::CreateNew`] refuses to touch a file that already exists. Missing parent
//! directories are created.
//!
//! ## Optional destinations
//! Syslog and the native event log are best effort: when they cannot be reached a warning
//! is written to the sinks already attached and setup carries on. The native event log
//! only exists on Windows; elsewhere requesting it does nothing.

mod context;

pub use context::LoggingContext;
pub use mlogconfig_core::{
    BootstrapError, Conflict, ConflictAction, ConflictKind, ConflictPolicy, FileMode,
    PromptPolicy, Severity,
};

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use mlogconfig_core::{
    EventSink, LogConsole, LogFile, ResolvedPath, ResolvedSink, default_app_name,
    native_event_sink, resolve_log_path, resolve_log_path_with,
};

use context::Registry;

/// Where records go and which ones are kept. Built once, then handed to [`setup_logging`].
#[derive(Debug, Clone)]
pub struct LogDestinationConfig {
    pub primary_path: PathBuf,
    /// Receives `ERROR` and `CRITICAL` records, in addition to the primary file.
    pub error_path: Option<PathBuf>,
    pub console: bool,
    pub syslog: bool,
    pub native_event_log: bool,
    pub level: Severity,
    pub file_mode: FileMode,
    /// Event log source name, defaults to the executable name.
    pub app_name: Option<String>,
    /// Replaces the platform's well-known syslog socket.
    pub syslog_address: Option<PathBuf>,
    /// Colour console levels. Defaults to whether stderr is a terminal.
    ///
    /// `colored` still has the last word and checks stdout plus `NO_COLOR`/`CLICOLOR_FORCE`.
    pub console_color: Option<bool>,
}

/// Returns a default configuration logging to `primary_path`.
pub fn logger_config<P: AsRef<Path>>(primary_path: P) -> LogDestinationConfig {
    LogDestinationConfig::new(primary_path)
}

impl LogDestinationConfig {
    pub fn new<P: AsRef<Path>>(primary_path: P) -> Self {
        Self {
            primary_path: primary_path.as_ref().to_path_buf(),
            error_path: None,
            console: false,
            syslog: false,
            native_event_log: false,
            level: Severity::Info,
            file_mode: FileMode::Append,
            app_name: None,
            syslog_address: None,
            console_color: None,
        }
    }

    /// Sets an error-only log file.
    pub fn with_error_log<P: AsRef<Path>>(self, path: P) -> Self {
        Self {
            error_path: Some(path.as_ref().to_path_buf()),
            ..self
        }
    }
    /// Maybe sets an error-only log file.
    pub fn maybe_with_error_log<P: AsRef<Path>>(self, path: Option<P>) -> Self {
        Self {
            error_path: path.map(|p| p.as_ref().to_path_buf()),
            ..self
        }
    }
    pub fn with_console(self, yes: bool) -> Self {
        Self {
            console: yes,
            ..self
        }
    }
    pub fn with_syslog(self, yes: bool) -> Self {
        Self {
            syslog: yes,
            ..self
        }
    }
    pub fn with_native_event_log(self, yes: bool) -> Self {
        Self {
            native_event_log: yes,
            ..self
        }
    }
    pub fn with_level(self, level: Severity) -> Self {
        Self { level, ..self }
    }
    pub fn with_file_mode(self, file_mode: FileMode) -> Self {
        Self { file_mode, ..self }
    }
    pub fn with_app_name(self, name: &str) -> Self {
        Self {
            app_name: Some(name.into()),
            ..self
        }
    }
    pub fn with_syslog_address<P: AsRef<Path>>(self, address: P) -> Self {
        Self {
            syslog_address: Some(address.as_ref().to_path_buf()),
            ..self
        }
    }
    pub fn with_console_color(self, yes: bool) -> Self {
        Self {
            console_color: Some(yes),
            ..self
        }
    }

    /// Validates the paths and attaches every requested sink.
    pub fn setup(&self) -> Result<LoggingContext, BootstrapError> {
        Assembler::new(self).assemble()
    }
}

/// Validates the paths in `config` and attaches every requested sink.
pub fn setup_logging(config: &LogDestinationConfig) -> Result<LoggingContext, BootstrapError> {
    config.setup()
}

/// Assembles a [`LoggingContext`] with optional hooks for conflict resolution and the
/// console writer.
pub struct Assembler<'a> {
    config: &'a LogDestinationConfig,
    policy: Option<&'a mut dyn ConflictPolicy>,
    console_writer: Option<Box<dyn Write + Send>>,
}

impl<'a> Assembler<'a> {
    pub fn new(config: &'a LogDestinationConfig) -> Self {
        Self {
            config,
            policy: None,
            console_writer: None,
        }
    }

    /// Consults `policy` when a log path conflicts instead of failing outright.
    pub fn with_conflict_policy(self, policy: &'a mut dyn ConflictPolicy) -> Self {
        Self {
            policy: Some(policy),
            ..self
        }
    }

    /// Writes console output to `writer` instead of stderr.
    pub fn with_console_writer(self, writer: Box<dyn Write + Send>) -> Self {
        Self {
            console_writer: Some(writer),
            ..self
        }
    }

    pub fn assemble(self) -> Result<LoggingContext, BootstrapError> {
        let Self {
            config,
            mut policy,
            console_writer,
        } = self;

        // both paths are checked against each other before anything is opened
        let primary = resolve(&config.primary_path, config.file_mode, &mut policy)?;
        let error = config
            .error_path
            .as_ref()
            .map(|path| resolve(path, config.file_mode, &mut policy))
            .transpose()?;
        if let Some(error) = &error
            && error.path() == primary.path()
        {
            return Err(BootstrapError::ConfigurationConflict(primary.path().into()));
        }
        // an `Overwrite` target is only emptied once every file has opened
        let primary = primary.open_deferred()?;
        let error = error.map(ResolvedPath::open_deferred).transpose()?;
        primary.truncate_if_overwrite()?;
        if let Some(error) = &error {
            error.truncate_if_overwrite()?;
        }
        let (primary_path, primary_file) = primary.into_parts();
        let error = error.map(ResolvedSink::into_parts);

        let mut registry = Registry::new(config.level);
        registry.attach(EventSink::File(LogFile::new(primary_file)), config.level)?;

        let error_path = match error {
            Some((path, file)) => {
                registry.attach(EventSink::File(LogFile::new(file)), Severity::Error)?;
                Some(path)
            }
            None => None,
        };

        if config.console {
            let console = match (console_writer, config.console_color) {
                (Some(writer), colored) => LogConsole::new(writer, colored.unwrap_or(false)),
                (None, Some(colored)) => LogConsole::new(Box::new(io::stderr()), colored),
                (None, None) => LogConsole::default(),
            };
            registry.attach(EventSink::Console(console), config.level)?;
        }

        if config.syslog {
            attach_syslog(&mut registry, config);
        }

        if config.native_event_log {
            attach_native_event_log(&mut registry, config);
        }

        Ok(LoggingContext::new(registry, primary_path, error_path))
    }
}

fn resolve(
    path: &Path,
    mode: FileMode,
    policy: &mut Option<&mut dyn ConflictPolicy>,
) -> Result<ResolvedPath, BootstrapError> {
    match policy {
        Some(policy) => resolve_log_path_with(path, mode, &mut **policy),
        None => resolve_log_path(path, mode),
    }
}

#[cfg(unix)]
fn attach_syslog(registry: &mut Registry, config: &LogDestinationConfig) {
    use mlogconfig_core::{SyslogWriter, default_syslog_address};

    let Some(address) = config
        .syslog_address
        .as_deref()
        .or_else(|| default_syslog_address())
    else {
        registry.warn("Syslog not available on this platform.");
        return;
    };
    match SyslogWriter::connect(address) {
        Ok(writer) => {
            if let Err(error) = registry.attach(EventSink::Syslog(writer), config.level) {
                registry.warn(&error.to_string());
            }
        }
        Err(error) => registry.warn(&format!(
            "Syslog not available at {}: {error}",
            address.display()
        )),
    }
}

#[cfg(not(unix))]
fn attach_syslog(registry: &mut Registry, _config: &LogDestinationConfig) {
    registry.warn("Syslog not available on this platform.");
}

fn attach_native_event_log(registry: &mut Registry, config: &LogDestinationConfig) {
    let app_name = config.app_name.clone().unwrap_or_else(default_app_name);
    if let Some(writer) = native_event_sink(&app_name)
        && let Err(error) = registry.attach(EventSink::NativeEventLog(writer), config.level)
    {
        registry.warn(&format!("Could not create event log handler. {error}"));
    }
}
