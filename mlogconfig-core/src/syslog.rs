//! Local syslog transport over a Unix domain socket.

use std::{
    io::{self, Write},
    os::unix::net::{UnixDatagram, UnixStream},
    path::{Path, PathBuf},
};

use nix::errno::Errno;

use crate::{
    error::EmitError,
    log_writer::LogWriter,
    utils::{LogRecord, Severity, format_log},
};

/// The `user` facility.
pub const LOG_USER: u8 = 1;

/// Well-known local syslog socket for the current platform family.
pub fn default_syslog_address() -> Option<&'static Path> {
    if cfg!(target_os = "linux") {
        Some(Path::new("/dev/log"))
    } else if cfg!(target_os = "macos") {
        Some(Path::new("/var/run/syslog"))
    } else {
        None
    }
}

fn severity_code(severity: Severity) -> u8 {
    match severity {
        Severity::Critical => 2,
        Severity::Error => 3,
        Severity::Warning => 4,
        Severity::Info => 6,
        Severity::Debug => 7,
    }
}

pub fn priority(facility: u8, severity: Severity) -> u8 {
    (facility << 3) | severity_code(severity)
}

enum Transport {
    Datagram(UnixDatagram),
    Stream(UnixStream),
}

impl Transport {
    fn connect(address: &Path) -> io::Result<Self> {
        let socket = UnixDatagram::unbound()?;
        match socket.connect(address) {
            Ok(()) => Ok(Transport::Datagram(socket)),
            // the daemon listens on a stream socket
            Err(e) if e.raw_os_error() == Some(Errno::EPROTOTYPE as i32) => {
                Ok(Transport::Stream(UnixStream::connect(address)?))
            }
            Err(e) => Err(e),
        }
    }

    fn send(&mut self, payload: &[u8]) -> io::Result<()> {
        match self {
            Transport::Datagram(socket) => socket.send(payload).map(|_| ()),
            Transport::Stream(stream) => stream.write_all(payload),
        }
    }
}

pub struct SyslogWriter {
    address: PathBuf,
    facility: u8,
    transport: Transport,
}

impl SyslogWriter {
    /// Connects to the socket at `address`. Fails when nothing listens there.
    pub fn connect<P: AsRef<Path>>(address: P) -> io::Result<Self> {
        let address = address.as_ref().to_path_buf();
        let transport = Transport::connect(&address)?;
        Ok(Self {
            address,
            facility: LOG_USER,
            transport,
        })
    }

    pub fn address(&self) -> &Path {
        &self.address
    }
}

impl LogWriter for SyslogWriter {
    fn write_record(&mut self, record: &LogRecord) -> Result<(), EmitError> {
        let pri = priority(self.facility, record.severity);
        let payload = format!("<{pri}>{}\0", format_log(record));
        if self.transport.send(payload.as_bytes()).is_err() {
            // syslogd may have been restarted since we connected
            self.transport = Transport::connect(&self.address)?;
            self.transport.send(payload.as_bytes())?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), EmitError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_user_facility() {
        assert_eq!(priority(LOG_USER, Severity::Critical), 10);
        assert_eq!(priority(LOG_USER, Severity::Error), 11);
        assert_eq!(priority(LOG_USER, Severity::Warning), 12);
        assert_eq!(priority(LOG_USER, Severity::Info), 14);
        assert_eq!(priority(LOG_USER, Severity::Debug), 15);
    }

    #[test]
    fn test_default_address_by_platform() {
        #[cfg(target_os = "linux")]
        assert_eq!(default_syslog_address(), Some(Path::new("/dev/log")));
        #[cfg(target_os = "macos")]
        assert_eq!(default_syslog_address(), Some(Path::new("/var/run/syslog")));
    }

    #[test]
    fn test_connect_missing_socket() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SyslogWriter::connect(dir.path().join("absent.sock")).is_err());
    }

    #[test]
    fn test_datagram_delivery() {
        let dir = tempfile::tempdir().unwrap();
        let address = dir.path().join("log.sock");
        let server = UnixDatagram::bind(&address).unwrap();
        let mut writer = SyslogWriter::connect(&address).unwrap();
        assert_eq!(writer.address(), address.as_path());
        writer
            .write_record(&LogRecord::new(Severity::Warning, "low battery"))
            .unwrap();

        let mut buf = [0u8; 512];
        let n = server.recv(&mut buf).unwrap();
        let payload = std::str::from_utf8(&buf[..n]).unwrap();
        assert!(payload.starts_with("<12>"));
        assert!(payload.ends_with(" - WARNING: low battery\0"));
    }
}
