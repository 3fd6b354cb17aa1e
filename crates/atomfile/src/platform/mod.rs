//! Platform file primitives
//!
//! One logical interface, two implementations, selected at build time:
//!
//! - **Windows**: `CreateFileW` share modes give strict OS-level exclusion, and
//!   `MoveFileExW(MOVEFILE_REPLACE_EXISTING)` replaces the target. Both can fail
//!   transiently while another process has the file open.
//! - **POSIX**: plain `open(2)` and `rename(2)`. Sharing modes do not exist, a
//!   rename never disturbs an open reader, and no error is transient.
//!
//! [`HostPlatform`] names the implementation for the current target.

#[cfg(not(windows))]
mod posix;
#[cfg(windows)]
mod windows;

#[cfg(not(windows))]
pub use posix::Posix;
#[cfg(windows)]
pub use windows::Windows;

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::path::Path;
use std::str::FromStr;

/// Platform implementation for the current build target
#[cfg(not(windows))]
pub type HostPlatform = Posix;

/// Platform implementation for the current build target
#[cfg(windows)]
pub type HostPlatform = Windows;

/// How a handle is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Read an existing file. Fails with `NotFound` if absent.
    Read,
    /// Read/write, creating the file if absent. Never truncates on open, so
    /// existing content survives until a lock is held.
    Write,
    /// Write a file that must not exist yet (temporary files).
    CreateNew,
}

/// OS-level sharing applied when opening a handle
///
/// Only meaningful on Windows; POSIX has no sharing modes and treats both
/// variants the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharingMode {
    /// Readers share with readers only; writers share with nobody
    #[default]
    Strict,
    /// Everyone shares everything; exclusion is left to advisory locks
    Permissive,
}

impl FromStr for SharingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "permissive" => Ok(Self::Permissive),
            other => Err(format!("unknown sharing mode '{other}'")),
        }
    }
}

/// File primitives the atomic operations are built from
pub trait Platform {
    /// Open `path` with the given access and sharing.
    fn open(&self, path: &Path, access: Access, sharing: SharingMode) -> io::Result<File>;

    /// Atomically make `temp`'s content the content of `target`, consuming
    /// the `temp` name. Replaces an existing `target`.
    fn replace(&self, temp: &Path, target: &Path) -> io::Result<()>;

    /// True if `err` is a short-lived sharing/access conflict worth retrying.
    fn is_transient(&self, err: &io::Error) -> bool;
}
