//! Error types for atomic file operations

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during atomic file operations
///
/// Lock refusal under non-blocking contention is not an error; it is reported
/// as `Ok(false)` / `Ok(None)` by the lock APIs.
#[derive(Error, Debug)]
pub enum AtomicFileError {
    /// Another process still holds the file in a conflicting mode after the
    /// retry budget was spent
    #[error("Sharing conflict on {path}: {source}")]
    Conflict { path: PathBuf, source: io::Error },

    /// Target file does not exist
    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    /// Access denied by the filesystem (ACL, mode bits, read-only volume)
    #[error("Permission denied on {path}: {source}")]
    PermissionDenied { path: PathBuf, source: io::Error },

    /// No space left on the volume
    #[error("Storage full while writing {path}: {source}")]
    StorageFull { path: PathBuf, source: io::Error },

    /// Any other file I/O error
    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    /// Path has no file name or parent directory
    #[error("Invalid target path: {path}")]
    InvalidPath { path: PathBuf },

    /// Lock requested on a handle that already holds one
    #[error("Lock already held on {path}")]
    AlreadyLocked { path: PathBuf },

    /// File content is not valid UTF-8
    #[error("Invalid UTF-8 in {path}: {source}")]
    InvalidUtf8 {
        path: PathBuf,
        source: std::string::FromUtf8Error,
    },
}

impl AtomicFileError {
    /// Classify an I/O error.
    ///
    /// `transient` is the platform's verdict on the error; a transient error
    /// that reaches this point has outlived the retry budget.
    pub fn from_io(path: &Path, source: io::Error, transient: bool) -> Self {
        let path = path.to_path_buf();
        if transient {
            return Self::Conflict { path, source };
        }
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path, source },
            io::ErrorKind::StorageFull => Self::StorageFull { path, source },
            _ => Self::Io { path, source },
        }
    }

    /// True when the failure was a sharing conflict worth retrying at a
    /// higher level.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Path the failing operation was acting on
    pub fn path(&self) -> &Path {
        match self {
            Self::Conflict { path, .. }
            | Self::NotFound { path }
            | Self::PermissionDenied { path, .. }
            | Self::StorageFull { path, .. }
            | Self::Io { path, .. }
            | Self::InvalidPath { path }
            | Self::AlreadyLocked { path }
            | Self::InvalidUtf8 { path, .. } => path,
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, AtomicFileError>;
