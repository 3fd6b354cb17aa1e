//! Temporary staging files for the rename strategy
//!
//! A temporary file for `dir/obj.json` is `dir/obj.json.<host>-<pid>-<seq>.tmp`.
//! It lives in the target's directory so the final replace stays on one
//! volume, and the host/pid/sequence triple keeps concurrent writers apart
//! even when several machines share the directory.

use crate::error::{AtomicFileError, Result};
use crate::platform::{Access, Platform, SharingMode};
use std::ffi::{OsStr, OsString};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Fixed tag ending every temporary file name
pub const TEMP_SUFFIX: &str = ".tmp";

/// Give up after this many name collisions in a row
const MAX_NAME_COLLISIONS: u32 = 16;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn host_tag() -> &'static str {
    static HOST: OnceLock<String> = OnceLock::new();
    HOST.get_or_init(|| {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .map(|h| {
                h.chars()
                    .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
                    .collect::<String>()
            })
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "localhost".to_string())
    })
}

/// Split a target path into its directory and file name.
pub(crate) fn split_target(target: &Path) -> Result<(&Path, &OsStr)> {
    let name = target
        .file_name()
        .ok_or_else(|| AtomicFileError::InvalidPath {
            path: target.to_path_buf(),
        })?;
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok((dir, name))
}

fn temp_name(name: &OsStr, seq: u64) -> OsString {
    let mut temp = name.to_os_string();
    temp.push(format!(".{}-{}-{seq}{TEMP_SUFFIX}", host_tag(), std::process::id()));
    temp
}

/// True if `candidate` is a temporary file name for target `name`.
pub fn is_temp_name_for(candidate: &OsStr, name: &OsStr) -> bool {
    let (Some(candidate), Some(name)) = (candidate.to_str(), name.to_str()) else {
        return false;
    };
    candidate.len() > name.len() + TEMP_SUFFIX.len() + 1
        && candidate.starts_with(name)
        && candidate[name.len()..].starts_with('.')
        && candidate.ends_with(TEMP_SUFFIX)
}

/// A staged temporary file, deleted on drop unless consumed by a replace
#[derive(Debug)]
pub(crate) struct TempFile {
    path: PathBuf,
    armed: bool,
}

impl TempFile {
    /// Create a fresh temporary file next to `target`.
    pub(crate) fn create<P: Platform>(
        platform: &P,
        target: &Path,
        sharing: SharingMode,
    ) -> Result<(Self, File)> {
        let (dir, name) = split_target(target)?;
        let mut collisions = 0;
        loop {
            let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
            let path = dir.join(temp_name(name, seq));
            match platform.open(&path, Access::CreateNew, sharing) {
                Ok(file) => {
                    debug!(temp = %path.display(), "created temp file");
                    return Ok((Self { path, armed: true }, file));
                }
                // a stale file from a crashed writer with a recycled pid
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists
                    && collisions < MAX_NAME_COLLISIONS =>
                {
                    collisions += 1;
                }
                Err(e) => {
                    let transient = platform.is_transient(&e);
                    return Err(AtomicFileError::from_io(&path, e, transient));
                }
            }
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// The file has been renamed away; nothing left to delete.
    pub(crate) fn consumed(mut self) {
        self.armed = false;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(temp = %self.path.display(), "removed temp file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(temp = %self.path.display(), error = %e, "failed to remove temp file"),
        }
    }
}

/// Remove temporary files left next to `target` by crashed writers.
///
/// Only files last modified more than `older_than` ago are removed, so an
/// in-flight write by another process is left alone when `older_than`
/// exceeds the longest expected write. Returns the number of files removed.
pub fn sweep_temp_files(target: &Path, older_than: Duration) -> Result<usize> {
    let (dir, name) = split_target(target)?;
    let entries = fs::read_dir(dir).map_err(|e| AtomicFileError::from_io(dir, e, false))?;
    let now = SystemTime::now();
    let mut removed = 0;

    for entry in entries {
        let entry = entry.map_err(|e| AtomicFileError::from_io(dir, e, false))?;
        if !is_temp_name_for(&entry.file_name(), name) {
            continue;
        }
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or(Duration::ZERO);
        if age < older_than {
            continue;
        }
        let path = entry.path();
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(temp = %path.display(), "swept stale temp file");
                removed += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(AtomicFileError::from_io(&path, e, false)),
        }
    }

    Ok(removed)
}
