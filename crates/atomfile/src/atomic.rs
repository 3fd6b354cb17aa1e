//! Atomic whole-file reads and writes
//!
//! Two strategies, never to be mixed on the same file:
//!
//! - **Rename**: stage the payload in a temporary file next to the target,
//!   then replace the target in one directory-entry swap. Readers simply open
//!   and read; they see the old file or the new one, never a mix.
//! - **Lock**: open the target itself, take a whole-file advisory lock, and
//!   truncate-then-write (exclusive) or read (shared) while holding it. A
//!   failed rewrite puts the prior content back before the lock is released.
//!
//! Transient sharing conflicts are retried per the configured
//! [`RetryPolicy`]; everything else surfaces as a typed
//! [`AtomicFileError`].
//!
//! # Example
//!
//! ```rust,no_run
//! use atomfile::{AtomicFile, AtomicFileConfig, Strategy};
//!
//! let config = AtomicFileConfig {
//!     strategy: Strategy::Rename,
//!     ..Default::default()
//! };
//! let store = AtomicFile::from_config(&config);
//!
//! store.write("/srv/world/objects/npc-42.json", br#"{"hp":10}"#)?;
//! let bytes = store.read("/srv/world/objects/npc-42.json")?;
//! assert_eq!(bytes, br#"{"hp":10}"#);
//! # Ok::<(), atomfile::AtomicFileError>(())
//! ```

use crate::config::{AtomicFileConfig, Strategy};
use crate::error::{AtomicFileError, Result};
use crate::lockable::LockableFile;
use crate::platform::{Access, HostPlatform, Platform, SharingMode};
use crate::retry::RetryPolicy;
use crate::temp::TempFile;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Atomic file access with a fixed strategy, sharing mode and retry policy
///
/// Holds no open handles; one value can serve any number of threads.
#[derive(Debug, Clone)]
pub struct AtomicFile<P: Platform = HostPlatform> {
    platform: P,
    strategy: Strategy,
    sharing: SharingMode,
    retry: RetryPolicy,
    sync_writes: bool,
}

impl Default for AtomicFile<HostPlatform> {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicFile<HostPlatform> {
    /// Host primitives with default settings.
    pub fn new() -> Self {
        Self::from_config(&AtomicFileConfig::default())
    }

    pub fn from_config(config: &AtomicFileConfig) -> Self {
        Self::with_platform(HostPlatform::default(), config)
    }
}

impl<P: Platform> AtomicFile<P> {
    /// Build on an explicit platform implementation.
    pub fn with_platform(platform: P, config: &AtomicFileConfig) -> Self {
        Self {
            platform,
            strategy: config.strategy,
            sharing: config.sharing,
            retry: config.retry.policy(),
            sync_writes: config.sync_writes,
        }
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_sharing(mut self, sharing: SharingMode) -> Self {
        self.sharing = sharing;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn sharing(&self) -> SharingMode {
        self.sharing
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn retrying<T>(&self, path: &Path, op: impl FnMut() -> io::Result<T>) -> Result<T> {
        self.retry
            .run(|e| self.platform.is_transient(e), op)
            .map_err(|e| {
                let transient = self.platform.is_transient(&e);
                AtomicFileError::from_io(path, e, transient)
            })
    }

    /// Write `payload` with the configured strategy.
    pub fn write(&self, path: impl AsRef<Path>, payload: impl AsRef<[u8]>) -> Result<()> {
        match self.strategy {
            Strategy::Rename => self.write_by_replace(path, payload),
            Strategy::Lock => self.write_by_lock(path, payload),
        }
    }

    /// Read the whole file with the configured strategy.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        match self.strategy {
            Strategy::Rename => self.read_by_rename(path),
            Strategy::Lock => self.read_by_lock(path),
        }
    }

    /// Read the whole file with the configured strategy as UTF-8 text.
    pub fn read_to_string(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        into_string(path, self.read(path)?)
    }

    /// Replace the target's content with `payload` via a temporary file.
    ///
    /// On any failure the temporary file is removed and the target keeps its
    /// previous content.
    pub fn write_by_replace(&self, path: impl AsRef<Path>, payload: impl AsRef<[u8]>) -> Result<()> {
        let path = path.as_ref();
        let payload = payload.as_ref();

        let (temp, mut file) = TempFile::create(&self.platform, path, self.sharing)?;
        file.write_all(payload)
            .map_err(|e| AtomicFileError::from_io(temp.path(), e, false))?;
        if self.sync_writes {
            file.sync_all()
                .map_err(|e| AtomicFileError::from_io(temp.path(), e, false))?;
        }
        // the handle must be closed before the replace on Windows
        drop(file);

        self.retrying(path, || self.platform.replace(temp.path(), path))?;
        temp.consumed();

        debug!(path = %path.display(), bytes = payload.len(), "replaced file");
        Ok(())
    }

    /// Read a file written by [`write_by_replace`](Self::write_by_replace).
    pub fn read_by_rename(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let path = path.as_ref();
        let mut file = self.retrying(path, || self.platform.open(path, Access::Read, self.sharing))?;

        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(|e| AtomicFileError::from_io(path, e, false))?;
        Ok(content)
    }

    pub fn read_by_rename_to_string(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        into_string(path, self.read_by_rename(path)?)
    }

    /// Rewrite the target in place under an exclusive lock.
    ///
    /// The file is opened without truncation, so existing content survives
    /// until the lock is held. Blocks while any other holder exists.
    pub fn write_by_lock(&self, path: impl AsRef<Path>, payload: impl AsRef<[u8]>) -> Result<()> {
        let path = path.as_ref();
        let mut handle = self.open_lockable(path, Access::Write)?;

        let mut guard = handle.lock(true)?;
        self.rewrite(&mut guard, payload.as_ref())?;
        guard.unlock()?;

        debug!(path = %path.display(), "rewrote locked file");
        handle.close()
    }

    /// Like [`write_by_lock`](Self::write_by_lock) but returns `Ok(false)`
    /// without touching the content if another holder has the lock.
    pub fn try_write_by_lock(
        &self,
        path: impl AsRef<Path>,
        payload: impl AsRef<[u8]>,
    ) -> Result<bool> {
        let path = path.as_ref();
        let mut handle = self.open_lockable(path, Access::Write)?;

        let Some(mut guard) = handle.try_lock(true)? else {
            debug!(path = %path.display(), "write skipped, lock contended");
            return Ok(false);
        };
        self.rewrite(&mut guard, payload.as_ref())?;
        guard.unlock()?;

        handle.close()?;
        Ok(true)
    }

    /// Replace the content of an exclusively locked file.
    ///
    /// Space is reserved before truncating. If the write still fails, the
    /// prior content is written back so the target is never left holding
    /// part of `payload`.
    fn rewrite(&self, file: &mut LockableFile, payload: &[u8]) -> Result<()> {
        let prior = file.read_to_end()?;
        let written = file
            .reserve(payload.len() as u64)
            .and_then(|()| file.truncate())
            .and_then(|()| file.write_all(payload));
        if let Err(e) = written {
            if let Err(restore) = file.truncate().and_then(|()| file.write_all(&prior)) {
                warn!(path = %file.path().display(), error = %restore, "failed to restore prior content");
            }
            return Err(e);
        }
        if self.sync_writes {
            file.sync()?;
        }
        Ok(())
    }

    /// Read the whole file under a shared lock.
    pub fn read_by_lock(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let path = path.as_ref();
        let mut handle = self.open_lockable(path, Access::Read)?;

        let mut guard = handle.lock(false)?;
        let content = guard.read_to_end()?;
        guard.unlock()?;

        handle.close()?;
        Ok(content)
    }

    pub fn read_by_lock_to_string(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        into_string(path, self.read_by_lock(path)?)
    }

    /// Open `path` as a [`LockableFile`] with the configured sharing mode,
    /// retrying transient conflicts. The handle starts unlocked.
    pub fn open_lockable(&self, path: impl AsRef<Path>, access: Access) -> Result<LockableFile> {
        let path = path.as_ref();
        let file = self.retrying(path, || self.platform.open(path, access, self.sharing))?;
        Ok(LockableFile::new(file, path))
    }
}

fn into_string(path: &Path, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|source| AtomicFileError::InvalidUtf8 {
        path: path.to_path_buf(),
        source,
    })
}

/// Replace `path` with `payload` using default settings.
pub fn write_by_replace(path: impl AsRef<Path>, payload: impl AsRef<[u8]>) -> Result<()> {
    AtomicFile::new().write_by_replace(path, payload)
}

/// Read a rename-strategy file using default settings.
pub fn read_by_rename(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    AtomicFile::new().read_by_rename(path)
}

/// Rewrite `path` under an exclusive lock using default settings.
pub fn write_by_lock(path: impl AsRef<Path>, payload: impl AsRef<[u8]>) -> Result<()> {
    AtomicFile::new().write_by_lock(path, payload)
}

/// Read `path` under a shared lock using default settings.
pub fn read_by_lock(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    AtomicFile::new().read_by_lock(path)
}
