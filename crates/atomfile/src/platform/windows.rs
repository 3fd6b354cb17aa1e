//! Windows primitives: CreateFileW share modes and MoveFileExW

use super::{Access, Platform, SharingMode};
use std::ffi::OsStr;
use std::fs::{File, OpenOptions};
use std::io;
use std::iter;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::fs::OpenOptionsExt;
use std::path::Path;

use windows_sys::Win32::Foundation::{
    ERROR_ACCESS_DENIED, ERROR_LOCK_VIOLATION, ERROR_SHARING_VIOLATION,
};
use windows_sys::Win32::Storage::FileSystem::{
    FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE, MOVEFILE_REPLACE_EXISTING,
    MOVEFILE_WRITE_THROUGH, MoveFileExW,
};

/// Windows file primitives
///
/// Opening or replacing a file another process holds open in a conflicting
/// mode fails with an access or sharing violation; those codes are reported
/// as transient so the retry policy can wait the other party out.
#[derive(Debug, Clone, Copy, Default)]
pub struct Windows;

fn share_mode(access: Access, sharing: SharingMode) -> u32 {
    match (sharing, access) {
        (SharingMode::Strict, Access::Read) => FILE_SHARE_READ,
        (SharingMode::Strict, Access::Write | Access::CreateNew) => 0,
        (SharingMode::Permissive, _) => FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
    }
}

fn wide(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(iter::once(0)).collect()
}

impl Platform for Windows {
    fn open(&self, path: &Path, access: Access, sharing: SharingMode) -> io::Result<File> {
        let mut options = OpenOptions::new();
        match access {
            Access::Read => options.read(true),
            Access::Write => options.read(true).write(true).create(true).truncate(false),
            Access::CreateNew => options.write(true).create_new(true),
        };
        options.share_mode(share_mode(access, sharing)).open(path)
    }

    fn replace(&self, temp: &Path, target: &Path) -> io::Result<()> {
        // Plain rename refuses an existing destination; the flag is required.
        let from = wide(temp.as_os_str());
        let to = wide(target.as_os_str());
        let ok = unsafe {
            MoveFileExW(
                from.as_ptr(),
                to.as_ptr(),
                MOVEFILE_REPLACE_EXISTING | MOVEFILE_WRITE_THROUGH,
            )
        };
        if ok != 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    fn is_transient(&self, err: &io::Error) -> bool {
        matches!(
            err.raw_os_error().map(|code| code as u32),
            Some(ERROR_ACCESS_DENIED | ERROR_SHARING_VIOLATION | ERROR_LOCK_VIOLATION)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_strict_writer_blocks_second_open() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("obj.json");

        let _writer = Windows
            .open(&path, Access::Write, SharingMode::Strict)
            .unwrap();
        let err = Windows
            .open(&path, Access::Read, SharingMode::Strict)
            .unwrap_err();
        assert!(Windows.is_transient(&err));
    }

    #[test]
    fn test_permissive_allows_concurrent_opens() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("obj.json");

        let _writer = Windows
            .open(&path, Access::Write, SharingMode::Permissive)
            .unwrap();
        let _reader = Windows
            .open(&path, Access::Read, SharingMode::Permissive)
            .unwrap();
    }

    #[test]
    fn test_replace_overwrites_existing_target() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("obj.json");
        let temp = temp_dir.path().join("obj.json.1.tmp");

        fs::write(&target, b"old").unwrap();
        fs::write(&temp, b"new").unwrap();

        Windows.replace(&temp, &target).unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"new");
        assert!(!temp.exists());
    }

    #[test]
    fn test_not_found_is_permanent() {
        let err = io::Error::from_raw_os_error(2);
        assert!(!Windows.is_transient(&err));
    }
}
