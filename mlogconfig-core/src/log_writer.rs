use std::{
    fs::File,
    io::{self, BufWriter, IsTerminal, Write},
};

use crate::{
    error::EmitError,
    event_log::EventLogWriter,
    utils::{LogRecord, format_log, format_log_colored},
};

#[cfg(unix)]
use crate::syslog::SyslogWriter;

pub trait LogWriter {
    fn write_record(&mut self, record: &LogRecord) -> Result<(), EmitError>;
    fn flush(&mut self) -> Result<(), EmitError>;
}

/// A log file opened by the path validator.
pub struct LogFile {
    file: BufWriter<File>,
}

impl LogFile {
    /// Wraps an already opened file. Its open mode decides whether writes append or
    /// start from an empty file.
    pub fn new(file: File) -> Self {
        Self {
            file: BufWriter::new(file),
        }
    }
}

impl LogWriter for LogFile {
    fn write_record(&mut self, record: &LogRecord) -> Result<(), EmitError> {
        writeln!(self.file, "{}", format_log(record))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), EmitError> {
        self.file.flush()?;
        Ok(())
    }
}

/// Console output, stderr unless another writer is supplied.
pub struct LogConsole {
    out: Box<dyn Write + Send>,
    colored: bool,
}

impl Default for LogConsole {
    fn default() -> Self {
        Self {
            out: Box::new(io::stderr()),
            colored: io::stderr().is_terminal(),
        }
    }
}

impl LogConsole {
    pub fn new(out: Box<dyn Write + Send>, colored: bool) -> Self {
        Self { out, colored }
    }
}

impl LogWriter for LogConsole {
    fn write_record(&mut self, record: &LogRecord) -> Result<(), EmitError> {
        let line = if self.colored {
            format_log_colored(record)
        } else {
            format_log(record)
        };
        writeln!(self.out, "{line}")?;
        self.out.flush()?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), EmitError> {
        self.out.flush()?;
        Ok(())
    }
}

/// Every destination a record can be fanned out to.
///
/// `NativeEventLog` is only ever built by [`crate::native_event_sink`] on platforms that
/// have one. `Null` is what a sink turns into once its destination has disappeared.
pub enum EventSink {
    File(LogFile),
    Console(LogConsole),
    #[cfg(unix)]
    Syslog(SyslogWriter),
    NativeEventLog(EventLogWriter),
    Null,
}

impl EventSink {
    pub fn kind(&self) -> &'static str {
        match self {
            EventSink::File(_) => "file",
            EventSink::Console(_) => "console",
            #[cfg(unix)]
            EventSink::Syslog(_) => "syslog",
            EventSink::NativeEventLog(_) => "event-log",
            EventSink::Null => "null",
        }
    }

    pub fn disable(&mut self) {
        *self = EventSink::Null;
    }
}

impl LogWriter for EventSink {
    fn write_record(&mut self, record: &LogRecord) -> Result<(), EmitError> {
        match self {
            EventSink::File(w) => w.write_record(record),
            EventSink::Console(w) => w.write_record(record),
            #[cfg(unix)]
            EventSink::Syslog(w) => w.write_record(record),
            EventSink::NativeEventLog(w) => w.write_record(record),
            EventSink::Null => Ok(()),
        }
    }

    fn flush(&mut self) -> Result<(), EmitError> {
        match self {
            EventSink::File(w) => w.flush(),
            EventSink::Console(w) => w.flush(),
            #[cfg(unix)]
            EventSink::Syslog(w) => w.flush(),
            EventSink::NativeEventLog(w) => w.flush(),
            EventSink::Null => Ok(()),
        }
    }
}
