use std::{io, path::PathBuf};

use thiserror::Error;

/// Failures raised while validating paths and assembling sinks.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("the directory {0:?} is not writeable")]
    PermissionDenied(PathBuf),

    #[error("the logfile {0:?} already exists, choose a different path for the new file")]
    AlreadyExists(PathBuf),

    #[error("log file and error log file both resolve to {0:?}, they should be different")]
    ConfigurationConflict(PathBuf),

    #[error("could not validate the log file path after {0} attempts")]
    ValidationExhausted(u32),

    #[error("could not attach {kind} sink")]
    HandlerAttachFailure {
        kind: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("could not create log directory {path:?}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not open log file {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("a global logger is already installed for this process")]
    AlreadyInstalled,
}

/// Failures raised by a sink while writing a single record.
///
/// These never leave the writer thread: they are counted and reported on stderr.
/// A missing native event log is only discovered here, at emit time, and
/// [`EmitError::DestinationMissing`] disables the sink that hit it.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("event log for source {0:?} not found")]
    DestinationMissing(String),

    #[error("native event log call failed with code {0}")]
    Native(u32),
}
