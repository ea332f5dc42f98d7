//! Log path validation.
//!
//! A candidate path is resolved to an absolute path, its directory is created when
//! missing and checked for write access, and the open mode is checked against an
//! existing file. Opening the file is a separate step so callers can compare resolved
//! paths before touching anything on disk.

use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    str::FromStr,
};

use thiserror::Error;

use crate::error::BootstrapError;

/// How many times a [`ConflictPolicy`] is consulted before giving up.
pub const CONFLICT_RETRY_BUDGET: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileMode {
    /// Keep existing content and write after it.
    #[default]
    Append,
    /// Truncate existing content.
    Overwrite,
    /// Refuse to touch an existing file.
    CreateNew,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid mode {0:?}, expected 'a' (append), 'w' (overwrite) or 'x' (new file)")]
pub struct ParseFileModeError(String);

impl FromStr for FileMode {
    type Err = ParseFileModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" | "append" => Ok(FileMode::Append),
            "w" | "overwrite" => Ok(FileMode::Overwrite),
            "x" | "n" | "new" | "create-new" => Ok(FileMode::CreateNew),
            _ => Err(ParseFileModeError(s.into())),
        }
    }
}

/// A path that passed validation but has not been opened yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    path: PathBuf,
    mode: FileMode,
}

impl ResolvedPath {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn open(self) -> Result<ResolvedSink, BootstrapError> {
        let sink = self.open_deferred()?;
        sink.truncate_if_overwrite()?;
        Ok(sink)
    }

    /// Opens the file but leaves an `Overwrite` target untouched until
    /// [`ResolvedSink::truncate_if_overwrite`] is called. Lets a caller open several files
    /// and destroy old content only once all of them opened.
    pub fn open_deferred(self) -> Result<ResolvedSink, BootstrapError> {
        let mut options = File::options();
        match self.mode {
            FileMode::Append => options.append(true).create(true),
            FileMode::Overwrite => options.write(true).create(true),
            FileMode::CreateNew => options.write(true).create_new(true),
        };
        match options.open(&self.path) {
            Ok(file) => Ok(ResolvedSink {
                path: self.path,
                mode: self.mode,
                file,
            }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(BootstrapError::AlreadyExists(self.path))
            }
            Err(source) => Err(BootstrapError::Open {
                path: self.path,
                source,
            }),
        }
    }
}

/// A validated, open, write-ready log file.
#[derive(Debug)]
pub struct ResolvedSink {
    path: PathBuf,
    mode: FileMode,
    file: File,
}

impl ResolvedSink {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// Empties a file opened in `Overwrite` mode. No-op for the other modes.
    pub fn truncate_if_overwrite(&self) -> Result<(), BootstrapError> {
        if self.mode != FileMode::Overwrite {
            return Ok(());
        }
        self.file.set_len(0).map_err(|source| BootstrapError::Open {
            path: self.path.clone(),
            source,
        })
    }

    pub fn into_parts(self) -> (PathBuf, File) {
        (self.path, self.file)
    }
}

/// Resolves and checks `path` without opening it.
pub fn resolve_log_path<P: AsRef<Path>>(
    path: P,
    mode: FileMode,
) -> Result<ResolvedPath, BootstrapError> {
    resolve_checked(path.as_ref(), mode, is_writable)
}

fn resolve_checked(
    path: &Path,
    mode: FileMode,
    writable: fn(&Path) -> bool,
) -> Result<ResolvedPath, BootstrapError> {
    let absolute = std::path::absolute(path).map_err(|source| BootstrapError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let (Some(dir), Some(file_name)) = (absolute.parent(), absolute.file_name()) else {
        return Err(BootstrapError::Open {
            path: absolute.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        });
    };

    fs::create_dir_all(dir).map_err(|source| BootstrapError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    if !writable(dir) {
        return Err(BootstrapError::PermissionDenied(dir.to_path_buf()));
    }
    // resolve symlinks and `..` so that two spellings of one file compare equal
    let dir = dir.canonicalize().map_err(|source| BootstrapError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(file_name);

    if mode == FileMode::CreateNew && path.exists() {
        return Err(BootstrapError::AlreadyExists(path));
    }
    Ok(ResolvedPath { path, mode })
}

/// Validates `path` and opens it in `mode`.
pub fn validate_log_file<P: AsRef<Path>>(
    path: P,
    mode: FileMode,
) -> Result<ResolvedSink, BootstrapError> {
    resolve_log_path(path, mode)?.open()
}

#[cfg(unix)]
fn is_writable(dir: &Path) -> bool {
    use nix::unistd::{AccessFlags, access};

    access(dir, AccessFlags::W_OK).is_ok()
}

#[cfg(not(unix))]
fn is_writable(dir: &Path) -> bool {
    fs::metadata(dir)
        .map(|meta| !meta.permissions().readonly())
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    /// The file exists and the mode forbids reusing it.
    AlreadyExists,
    /// The file's directory cannot be written to.
    NotWritable { directory: PathBuf },
}

/// A validation failure a [`ConflictPolicy`] may be able to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub path: PathBuf,
    /// 1-based, at most [`CONFLICT_RETRY_BUDGET`].
    pub attempt: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictAction {
    Append,
    Overwrite,
    NewPath(PathBuf),
    /// No usable decision this time. Consumes an attempt.
    Retry,
    /// Stop and report the original failure.
    Abort,
}

pub trait ConflictPolicy {
    fn resolve(&mut self, conflict: &Conflict) -> ConflictAction;
}

impl<F> ConflictPolicy for F
where
    F: FnMut(&Conflict) -> ConflictAction,
{
    fn resolve(&mut self, conflict: &Conflict) -> ConflictAction {
        self(conflict)
    }
}

/// Like [`resolve_log_path`], asking `policy` what to do about conflicts.
///
/// `Append` and `Overwrite` only settle an existing file; for a directory that is not
/// writable the policy has to supply a new path.
pub fn resolve_log_path_with<P: AsRef<Path>>(
    path: P,
    mode: FileMode,
    policy: &mut dyn ConflictPolicy,
) -> Result<ResolvedPath, BootstrapError> {
    resolve_checked_with(path.as_ref(), mode, policy, is_writable)
}

fn resolve_checked_with(
    path: &Path,
    mode: FileMode,
    policy: &mut dyn ConflictPolicy,
    writable: fn(&Path) -> bool,
) -> Result<ResolvedPath, BootstrapError> {
    let mut candidate = path.to_path_buf();
    let mut mode = mode;
    let mut attempt = 0;
    loop {
        let error = match resolve_checked(&candidate, mode, writable) {
            Ok(resolved) => return Ok(resolved),
            Err(error) => error,
        };
        let (kind, path) = match &error {
            BootstrapError::AlreadyExists(path) => (ConflictKind::AlreadyExists, path.clone()),
            BootstrapError::PermissionDenied(directory) => (
                ConflictKind::NotWritable {
                    directory: directory.clone(),
                },
                candidate.clone(),
            ),
            _ => return Err(error),
        };
        if attempt == CONFLICT_RETRY_BUDGET {
            return Err(BootstrapError::ValidationExhausted(CONFLICT_RETRY_BUDGET));
        }
        attempt += 1;

        let reuse_allowed = kind == ConflictKind::AlreadyExists;
        match policy.resolve(&Conflict {
            kind,
            path,
            attempt,
        }) {
            ConflictAction::Append if reuse_allowed => mode = FileMode::Append,
            ConflictAction::Overwrite if reuse_allowed => mode = FileMode::Overwrite,
            ConflictAction::NewPath(path) => candidate = path,
            ConflictAction::Abort => return Err(error),
            ConflictAction::Append | ConflictAction::Overwrite | ConflictAction::Retry => {}
        }
    }
}

/// Like [`validate_log_file`], asking `policy` what to do about conflicts.
pub fn validate_log_file_with<P: AsRef<Path>>(
    path: P,
    mode: FileMode,
    policy: &mut dyn ConflictPolicy,
) -> Result<ResolvedSink, BootstrapError> {
    resolve_log_path_with(path, mode, policy)?.open()
}
