//! Whole-file advisory locks over an open handle
//!
//! [`LockableFile`] owns a file handle plus its lock state. Locks are taken
//! over the entire file range and are advisory: only participants that lock
//! are excluded.
//!
//! - **Linux**: open-file-description record locks (`F_OFD_SETLK[W]`). They
//!   conflict with classic `fcntl`/`lockf` record locks held by other
//!   programs, work over NFS, and belong to the handle rather than the
//!   process, so two handles in one process exclude each other.
//! - **Other Unix**: `flock(2)`.
//! - **Windows**: `LockFileEx` over the full 64-bit range.
//!
//! Scoped use goes through [`LockGuard`], which releases the lock on drop so
//! an early return or `?` cannot leak it past the owning call.

use crate::error::{AtomicFileError, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lock held by a [`LockableFile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Shared,
    Exclusive,
}

/// An open file handle with advisory lock state
#[derive(Debug)]
pub struct LockableFile {
    file: File,
    path: PathBuf,
    state: LockState,
}

#[cfg(target_os = "linux")]
mod sys {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::AsRawFd;

    fn fcntl_lock(file: &File, lock_type: libc::c_int, cmd: libc::c_int) -> io::Result<()> {
        // SAFETY: an all-zero `flock` is valid; start 0 and len 0 span the
        // whole file, and OFD locks require `l_pid == 0`.
        let mut lock: libc::flock = unsafe { std::mem::zeroed() };
        lock.l_type = lock_type as libc::c_short;
        lock.l_whence = libc::SEEK_SET as libc::c_short;
        let rc = unsafe { libc::fcntl(file.as_raw_fd(), cmd, &mut lock as *mut libc::flock) };
        if rc == -1 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    pub(super) fn lock(file: &File, exclusive: bool, blocking: bool) -> io::Result<()> {
        let lock_type = if exclusive { libc::F_WRLCK } else { libc::F_RDLCK };
        let cmd = if blocking {
            libc::F_OFD_SETLKW
        } else {
            libc::F_OFD_SETLK
        };
        fcntl_lock(file, lock_type, cmd)
    }

    pub(super) fn unlock(file: &File) -> io::Result<()> {
        fcntl_lock(file, libc::F_UNLCK, libc::F_OFD_SETLK)
    }

    pub(super) fn is_contended(err: &io::Error) -> bool {
        matches!(err.raw_os_error(), Some(libc::EAGAIN) | Some(libc::EACCES))
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use fs2::FileExt;
    use std::fs::File;
    use std::io;

    pub(super) fn lock(file: &File, exclusive: bool, blocking: bool) -> io::Result<()> {
        match (exclusive, blocking) {
            (true, true) => FileExt::lock_exclusive(file),
            (false, true) => FileExt::lock_shared(file),
            (true, false) => FileExt::try_lock_exclusive(file),
            (false, false) => FileExt::try_lock_shared(file),
        }
    }

    pub(super) fn unlock(file: &File) -> io::Result<()> {
        FileExt::unlock(file)
    }

    pub(super) fn is_contended(err: &io::Error) -> bool {
        err.kind() == io::ErrorKind::WouldBlock
            || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
    }
}

impl LockableFile {
    /// Wrap an already opened handle. `path` is used for error reporting.
    pub fn new(file: File, path: impl Into<PathBuf>) -> Self {
        Self {
            file,
            path: path.into(),
            state: LockState::Unlocked,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    /// Acquire a whole-file lock.
    ///
    /// Returns `Ok(false)` only when `blocking` is false and another holder
    /// conflicts; the state stays `Unlocked` in that case. Acquiring while a
    /// lock is already held is an error.
    pub fn acquire(&mut self, exclusive: bool, blocking: bool) -> Result<bool> {
        if self.state != LockState::Unlocked {
            return Err(AtomicFileError::AlreadyLocked {
                path: self.path.clone(),
            });
        }

        let result = loop {
            match sys::lock(&self.file, exclusive, blocking) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };

        match result {
            Ok(()) => {
                self.state = if exclusive {
                    LockState::Exclusive
                } else {
                    LockState::Shared
                };
                debug!(path = %self.path.display(), exclusive, "lock acquired");
                Ok(true)
            }
            Err(e) if !blocking && sys::is_contended(&e) => {
                debug!(path = %self.path.display(), exclusive, "lock contended");
                Ok(false)
            }
            Err(e) => Err(AtomicFileError::from_io(&self.path, e, false)),
        }
    }

    /// Release the lock if one is held. Idempotent.
    pub fn release(&mut self) -> Result<()> {
        if self.state == LockState::Unlocked {
            return Ok(());
        }
        sys::unlock(&self.file).map_err(|e| AtomicFileError::from_io(&self.path, e, false))?;
        self.state = LockState::Unlocked;
        debug!(path = %self.path.display(), "lock released");
        Ok(())
    }

    /// Block until the lock is held and return a guard that releases it.
    pub fn lock(&mut self, exclusive: bool) -> Result<LockGuard<'_>> {
        self.acquire(exclusive, true)?;
        Ok(LockGuard { file: self })
    }

    /// Take the lock without blocking. `Ok(None)` when contended.
    pub fn try_lock(&mut self, exclusive: bool) -> Result<Option<LockGuard<'_>>> {
        if self.acquire(exclusive, false)? {
            Ok(Some(LockGuard { file: self }))
        } else {
            Ok(None)
        }
    }

    /// Read the whole file from the start.
    pub fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_end(&mut content))
            .map_err(|e| AtomicFileError::from_io(&self.path, e, false))?;
        Ok(content)
    }

    /// Write all of `data` at the current position.
    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.file
            .write_all(data)
            .and_then(|_| self.file.flush())
            .map_err(|e| AtomicFileError::from_io(&self.path, e, false))
    }

    /// Reserve `len` bytes of storage for the file.
    ///
    /// Fails only when the volume or a quota cannot hold `len` bytes; a
    /// filesystem without preallocation support is not an error.
    pub fn reserve(&mut self, len: u64) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        match FileExt::allocate(&self.file, len) {
            Ok(()) => Ok(()),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::StorageFull
                        | io::ErrorKind::QuotaExceeded
                        | io::ErrorKind::FileTooLarge
                ) =>
            {
                Err(AtomicFileError::from_io(&self.path, e, false))
            }
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "preallocation unavailable");
                Ok(())
            }
        }
    }

    /// Cut the file to zero length and rewind.
    pub fn truncate(&mut self) -> Result<()> {
        self.file
            .set_len(0)
            .and_then(|_| self.file.seek(SeekFrom::Start(0)))
            .map(|_| ())
            .map_err(|e| AtomicFileError::from_io(&self.path, e, false))
    }

    /// Flush file data and metadata to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file
            .sync_all()
            .map_err(|e| AtomicFileError::from_io(&self.path, e, false))
    }

    /// Release any held lock, then close the handle.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }
}

impl Drop for LockableFile {
    fn drop(&mut self) {
        if self.state == LockState::Unlocked {
            return;
        }
        if let Err(e) = sys::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "failed to unlock on close");
        }
    }
}

/// Scoped lock over a [`LockableFile`]; releases on drop
#[derive(Debug)]
pub struct LockGuard<'a> {
    file: &'a mut LockableFile,
}

impl LockGuard<'_> {
    /// Release now, reporting an unlock failure instead of logging it.
    pub fn unlock(self) -> Result<()> {
        self.file.release()
    }
}

impl Deref for LockGuard<'_> {
    type Target = LockableFile;

    fn deref(&self) -> &LockableFile {
        &*self.file
    }
}

impl DerefMut for LockGuard<'_> {
    fn deref_mut(&mut self) -> &mut LockableFile {
        &mut *self.file
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.file.release() {
            warn!(path = %self.file.path.display(), error = %e, "failed to release lock");
        }
    }
}
