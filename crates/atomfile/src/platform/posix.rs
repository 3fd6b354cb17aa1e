//! POSIX primitives: plain open and rename(2)

use super::{Access, Platform, SharingMode};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

/// POSIX file primitives
///
/// Renaming over a path leaves readers that already hold the old inode
/// undisturbed, so no operation here fails transiently and the retry policy
/// degrades to a single call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Posix;

impl Platform for Posix {
    fn open(&self, path: &Path, access: Access, _sharing: SharingMode) -> io::Result<File> {
        let mut options = OpenOptions::new();
        match access {
            Access::Read => options.read(true),
            Access::Write => options.read(true).write(true).create(true).truncate(false),
            Access::CreateNew => options.write(true).create_new(true),
        };
        options.open(path)
    }

    fn replace(&self, temp: &Path, target: &Path) -> io::Result<()> {
        fs::rename(temp, target)
    }

    fn is_transient(&self, _err: &io::Error) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use tempfile::TempDir;

    #[test]
    fn test_open_read_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let err = Posix
            .open(&temp_dir.path().join("missing.json"), Access::Read, SharingMode::Strict)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_open_write_creates_without_truncating() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("obj.json");

        drop(Posix.open(&path, Access::Write, SharingMode::Strict).unwrap());
        assert!(path.exists());

        fs::write(&path, b"existing").unwrap();
        drop(Posix.open(&path, Access::Write, SharingMode::Permissive).unwrap());
        assert_eq!(fs::read(&path).unwrap(), b"existing");
    }

    #[test]
    fn test_open_create_new_refuses_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("obj.json.tmp");

        let mut file = Posix.open(&path, Access::CreateNew, SharingMode::Strict).unwrap();
        file.write_all(b"x").unwrap();

        let err = Posix
            .open(&path, Access::CreateNew, SharingMode::Strict)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_replace_overwrites_existing_target() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("obj.json");
        let temp = temp_dir.path().join("obj.json.1.tmp");

        fs::write(&target, b"old").unwrap();
        fs::write(&temp, b"new").unwrap();

        Posix.replace(&temp, &target).unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"new");
        assert!(!temp.exists());
    }

    #[test]
    fn test_replace_leaves_open_reader_on_old_content() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("obj.json");
        let temp = temp_dir.path().join("obj.json.2.tmp");

        fs::write(&target, b"old").unwrap();
        let mut reader = Posix.open(&target, Access::Read, SharingMode::Strict).unwrap();

        fs::write(&temp, b"new").unwrap();
        Posix.replace(&temp, &target).unwrap();

        let mut seen = Vec::new();
        reader.read_to_end(&mut seen).unwrap();
        assert_eq!(seen, b"old");
    }

    #[test]
    fn test_nothing_is_transient() {
        assert!(!Posix.is_transient(&io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(!Posix.is_transient(&io::Error::from(io::ErrorKind::WouldBlock)));
    }
}
