//! Adapter from log records to the operating system's native event log.
//!
//! Only Windows provides one. On every other platform [`native_event_sink`] returns
//! `None` and the destination is never constructed.

use crate::{
    error::EmitError,
    log_writer::LogWriter,
    utils::{LogRecord, Severity},
};

/// Event identifier attached to every reported record.
pub const EVENT_ID: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Error,
    Warning,
    Informational,
}

impl From<Severity> for EventType {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Error | Severity::Critical => EventType::Error,
            Severity::Warning => EventType::Warning,
            Severity::Info | Severity::Debug => EventType::Informational,
        }
    }
}

/// The platform call that files one event.
pub trait EventReporter: Send {
    fn report(&mut self, source: &str, event_type: EventType, message: &str)
    -> Result<(), EmitError>;
}

pub struct EventLogWriter {
    app_name: String,
    reporter: Box<dyn EventReporter>,
}

impl EventLogWriter {
    pub fn new(app_name: impl Into<String>, reporter: Box<dyn EventReporter>) -> Self {
        Self {
            app_name: app_name.into(),
            reporter,
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }
}

impl LogWriter for EventLogWriter {
    /// Forwards the bare message; the event log stamps its own time and level.
    fn write_record(&mut self, record: &LogRecord) -> Result<(), EmitError> {
        self.reporter
            .report(&self.app_name, record.severity.into(), &record.message)
    }

    fn flush(&mut self) -> Result<(), EmitError> {
        Ok(())
    }
}

/// Builds the native event-log writer when this platform has one.
pub fn native_event_sink(app_name: &str) -> Option<EventLogWriter> {
    #[cfg(windows)]
    {
        Some(EventLogWriter::new(
            app_name,
            Box::new(windows::WindowsEventLog),
        ))
    }
    #[cfg(not(windows))]
    {
        let _ = app_name;
        None
    }
}

/// Event source name derived from the running executable.
pub fn default_app_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "mlogconfig".into())
}

#[cfg(windows)]
mod windows {
    use std::{ffi::OsStr, os::windows::ffi::OsStrExt, ptr};

    use windows_sys::Win32::{
        Foundation::{ERROR_FILE_NOT_FOUND, GetLastError},
        Security::{LookupAccountNameW, SID_NAME_USE},
        System::EventLog::{
            DeregisterEventSource, EVENTLOG_ERROR_TYPE, EVENTLOG_INFORMATION_TYPE,
            EVENTLOG_WARNING_TYPE, RegisterEventSourceW, ReportEventW,
        },
    };

    use super::{EVENT_ID, EventReporter, EventType};
    use crate::error::EmitError;

    const MAX_SID_SIZE: usize = 68;
    const MAX_DOMAIN_LEN: usize = 256;

    pub(super) struct WindowsEventLog;

    fn wide(s: &str) -> Vec<u16> {
        OsStr::new(s).encode_wide().chain(Some(0)).collect()
    }

    fn last_error(source: &str) -> EmitError {
        let code = unsafe { GetLastError() };
        if code == ERROR_FILE_NOT_FOUND {
            EmitError::DestinationMissing(source.into())
        } else {
            EmitError::Native(code)
        }
    }

    /// Looks up the SID of the current user. Not cached: every record resolves it again.
    fn current_user_sid(sid: &mut [u8; MAX_SID_SIZE]) -> Result<(), EmitError> {
        let user = std::env::var("USERNAME").unwrap_or_default();
        let user = wide(&user);
        let mut sid_len = MAX_SID_SIZE as u32;
        let mut domain = [0u16; MAX_DOMAIN_LEN];
        let mut domain_len = MAX_DOMAIN_LEN as u32;
        let mut sid_use: SID_NAME_USE = 0;
        let ok = unsafe {
            LookupAccountNameW(
                ptr::null(),
                user.as_ptr(),
                sid.as_mut_ptr().cast(),
                &mut sid_len,
                domain.as_mut_ptr(),
                &mut domain_len,
                &mut sid_use,
            )
        };
        if ok == 0 {
            return Err(EmitError::Native(unsafe { GetLastError() }));
        }
        Ok(())
    }

    impl EventReporter for WindowsEventLog {
        fn report(
            &mut self,
            source: &str,
            event_type: EventType,
            message: &str,
        ) -> Result<(), EmitError> {
            let mut sid = [0u8; MAX_SID_SIZE];
            current_user_sid(&mut sid)?;

            let source_w = wide(source);
            let handle = unsafe { RegisterEventSourceW(ptr::null(), source_w.as_ptr()) };
            if handle.is_null() {
                return Err(last_error(source));
            }

            let kind = match event_type {
                EventType::Error => EVENTLOG_ERROR_TYPE,
                EventType::Warning => EVENTLOG_WARNING_TYPE,
                EventType::Informational => EVENTLOG_INFORMATION_TYPE,
            };
            let message_w = wide(message);
            let strings = [message_w.as_ptr()];
            let ok = unsafe {
                ReportEventW(
                    handle,
                    kind,
                    0,
                    EVENT_ID,
                    sid.as_mut_ptr().cast(),
                    strings.len() as u16,
                    0,
                    strings.as_ptr(),
                    ptr::null(),
                )
            };
            let result = if ok == 0 { Err(last_error(source)) } else { Ok(()) };
            unsafe { DeregisterEventSource(handle) };
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        log_writer::EventSink,
        utils::{HandlerErrors, spawn_log_thread},
    };
    use std::sync::{Arc, Mutex};

    type Reports = Arc<Mutex<Vec<(String, EventType, String)>>>;

    struct RecordingReporter(Reports);

    impl EventReporter for RecordingReporter {
        fn report(
            &mut self,
            source: &str,
            event_type: EventType,
            message: &str,
        ) -> Result<(), EmitError> {
            self.0
                .lock()
                .unwrap()
                .push((source.into(), event_type, message.into()));
            Ok(())
        }
    }

    struct FailingReporter {
        calls: Arc<Mutex<usize>>,
        missing: bool,
    }

    impl EventReporter for FailingReporter {
        fn report(&mut self, source: &str, _: EventType, _: &str) -> Result<(), EmitError> {
            *self.calls.lock().unwrap() += 1;
            if self.missing {
                Err(EmitError::DestinationMissing(source.into()))
            } else {
                Err(EmitError::Native(5))
            }
        }
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(EventType::from(Severity::Critical), EventType::Error);
        assert_eq!(EventType::from(Severity::Error), EventType::Error);
        assert_eq!(EventType::from(Severity::Warning), EventType::Warning);
        assert_eq!(EventType::from(Severity::Info), EventType::Informational);
        assert_eq!(EventType::from(Severity::Debug), EventType::Informational);
    }

    #[test]
    fn test_forwards_raw_message_and_app_name() {
        let reports = Reports::default();
        let reporter = RecordingReporter(reports.clone());
        let mut writer = EventLogWriter::new("backup", Box::new(reporter));
        assert_eq!(writer.app_name(), "backup");
        writer
            .write_record(&LogRecord::new(Severity::Warning, "disk almost full"))
            .unwrap();
        let reports = reports.lock().unwrap();
        assert_eq!(
            reports.as_slice(),
            &[(
                "backup".to_string(),
                EventType::Warning,
                "disk almost full".to_string()
            )]
        );
    }

    #[test]
    fn test_native_failures_are_counted_not_raised() {
        let calls = Arc::new(Mutex::new(0));
        let writer = EventLogWriter::new(
            "backup",
            Box::new(FailingReporter {
                calls: calls.clone(),
                missing: false,
            }),
        );
        let errors = HandlerErrors::default();
        let sender = spawn_log_thread(EventSink::NativeEventLog(writer), errors.clone()).unwrap();
        for _ in 0..3 {
            sender.send_record(Arc::new(LogRecord::new(Severity::Error, "boom")));
        }
        sender.shutdown();
        assert_eq!(*calls.lock().unwrap(), 3);
        assert_eq!(errors.count(), 3);
    }

    #[test]
    fn test_missing_destination_disables_sink() {
        let calls = Arc::new(Mutex::new(0));
        let writer = EventLogWriter::new(
            "backup",
            Box::new(FailingReporter {
                calls: calls.clone(),
                missing: true,
            }),
        );
        let errors = HandlerErrors::default();
        let sender = spawn_log_thread(EventSink::NativeEventLog(writer), errors.clone()).unwrap();
        for _ in 0..3 {
            sender.send_record(Arc::new(LogRecord::new(Severity::Info, "hello")));
        }
        sender.shutdown();
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(errors.count(), 1);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_no_native_sink_off_windows() {
        assert!(native_event_sink("backup").is_none());
    }

    #[test]
    fn test_default_app_name_not_empty() {
        assert!(!default_app_name().is_empty());
    }
}
