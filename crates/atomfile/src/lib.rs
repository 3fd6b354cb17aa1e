//! Atomic cross-process file access
//!
//! This crate lets independent processes on one machine, or on several
//! machines sharing a network volume, read and write individual data files
//! without a coordinator. A reader never observes a half-written file, and a
//! writer never corrupts a file being read.
//!
//! Two strategies are offered; pick one per file namespace and never mix them:
//!
//! - **Rename** ([`AtomicFile::write_by_replace`] / [`AtomicFile::read_by_rename`]):
//!   write a temporary file beside the target, then atomically replace the
//!   target with it.
//! - **Lock** ([`AtomicFile::write_by_lock`] / [`AtomicFile::read_by_lock`]):
//!   rewrite or read the target itself while holding a whole-file advisory
//!   lock.
//!
//! Platform differences (Windows share modes and `MoveFileExW` versus POSIX
//! `rename(2)`) live behind [`platform::Platform`], selected at build time.
//! On Windows, transient sharing violations are retried per
//! [`RetryPolicy`]; on POSIX no error is transient and the policy is a plain
//! call.

pub mod atomic;
pub mod config;
pub mod error;
pub mod lockable;
pub mod logging;
pub mod platform;
pub mod retry;
pub mod temp;

pub use atomic::{AtomicFile, read_by_lock, read_by_rename, write_by_lock, write_by_replace};
pub use config::{AtomicFileConfig, ConfigError, ConfigOverrides, RetryConfig, Strategy};
pub use error::AtomicFileError;
pub use lockable::{LockGuard, LockState, LockableFile};
pub use platform::{Access, HostPlatform, Platform, SharingMode};
pub use retry::RetryPolicy;
pub use temp::sweep_temp_files;
