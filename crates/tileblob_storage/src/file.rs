//! File-based storage backend for persistent storage.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-based storage backend.
///
/// This backend provides persistent storage using OS file APIs.
/// Data survives process restarts.
///
/// # Durability
///
/// - `flush()` calls `File::flush()` to push data to the OS
/// - `sync()` calls `File::sync_all()` to ensure data is on disk
///
/// # Single-writer enforcement
///
/// [`FileBackend::open_exclusive`] takes a non-blocking advisory lock on
/// the file and fails with [`StorageError::Locked`] if another process
/// already holds it. The lock is released when the backend is dropped.
///
/// # Example
///
/// ```no_run
/// use tileblob_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("tiles.blob")).unwrap();
/// backend.write_at(0, b"persistent data").unwrap();
/// backend.sync().unwrap();  // Ensure data is durable
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: RwLock<File>,
    len: RwLock<u64>,
    read_only: bool,
}

impl FileBackend {
    /// Opens or creates a file backend at the given path.
    ///
    /// If the file exists, it is opened for reading and writing.
    /// If it doesn't exist, a new file is created.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        Self::from_file(path, file, false)
    }

    /// Opens or creates a file backend and takes an exclusive advisory lock.
    ///
    /// Use this for write access: it guarantees no other process holds the
    /// file for writing at the same time.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another process holds the lock,
    /// or an I/O error if the file cannot be opened or created.
    pub fn open_exclusive(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        Self::from_file(path, file, false)
    }

    /// Opens an existing file backend for reading only.
    ///
    /// All calls to `write_at` will fail with [`StorageError::ReadOnly`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be opened.
    pub fn open_read_only(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        Self::from_file(path, file, true)
    }

    fn from_file(path: &Path, file: File, read_only: bool) -> StorageResult<Self> {
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            len: RwLock::new(len),
            read_only,
        })
    }

    /// Returns whether this backend was opened read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = *self.len.read();
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }

        if data.is_empty() {
            return Ok(());
        }

        let mut file = self.file.write();
        let mut len = self.len.write();

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;

        let end = offset + data.len() as u64;
        if end > *len {
            *len = end;
        }

        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        let mut file = self.file.write();
        file.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        let file = self.file.write();
        file.sync_all()?;
        Ok(())
    }

    fn len(&self) -> StorageResult<u64> {
        Ok(*self.len.read())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blob");

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.len().unwrap(), 0);
        assert!(backend.is_empty().unwrap());
        assert!(path.exists());
    }

    #[test]
    fn file_write_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blob");

        let mut backend = FileBackend::open(&path).unwrap();

        backend.write_at(0, b"hello").unwrap();
        backend.write_at(5, b" world").unwrap();

        assert_eq!(backend.len().unwrap(), 11);

        let data = backend.read_at(0, 11).unwrap();
        assert_eq!(&data, b"hello world");
    }

    #[test]
    fn file_overwrite_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blob");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.write_at(0, b"hello world").unwrap();
        backend.write_at(0, b"HELLO").unwrap();

        assert_eq!(backend.len().unwrap(), 11);
        assert_eq!(backend.read_at(0, 11).unwrap(), b"HELLO world");
    }

    #[test]
    fn file_write_past_end_leaves_zero_gap() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blob");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.write_at(0, b"ab").unwrap();
        backend.write_at(6, b"cd").unwrap();

        assert_eq!(backend.len().unwrap(), 8);
        assert_eq!(backend.read_at(0, 8).unwrap(), b"ab\0\0\0\0cd");
    }

    #[test]
    fn file_read_past_end_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blob");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.write_at(0, b"hello").unwrap();

        let result = backend.read_at(10, 5);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blob");

        // Write data
        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.write_at(0, b"persistent data").unwrap();
            backend.sync().unwrap();
        }

        // Reopen and read
        {
            let backend = FileBackend::open(&path).unwrap();
            assert_eq!(backend.len().unwrap(), 15);

            let data = backend.read_at(0, 15).unwrap();
            assert_eq!(&data, b"persistent data");
        }
    }

    #[test]
    fn file_read_only_rejects_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blob");

        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.write_at(0, b"data").unwrap();
            backend.sync().unwrap();
        }

        let mut backend = FileBackend::open_read_only(&path).unwrap();
        assert!(backend.is_read_only());
        assert_eq!(backend.read_at(0, 4).unwrap(), b"data");

        let result = backend.write_at(0, b"x");
        assert!(matches!(result, Err(StorageError::ReadOnly)));
    }

    #[test]
    fn file_read_only_missing_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nonexistent.blob");

        let result = FileBackend::open_read_only(&path);
        assert!(matches!(result, Err(StorageError::Io(_))));
    }

    #[test]
    fn exclusive_lock_prevents_second_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blob");

        let _first = FileBackend::open_exclusive(&path).unwrap();

        let result = FileBackend::open_exclusive(&path);
        assert!(matches!(result, Err(StorageError::Locked)));
    }

    #[test]
    fn exclusive_lock_released_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blob");

        {
            let _backend = FileBackend::open_exclusive(&path).unwrap();
        }

        let _second = FileBackend::open_exclusive(&path).unwrap();
    }

    #[test]
    fn file_empty_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blob");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.write_at(0, b"x").unwrap();
        backend.write_at(1, b"").unwrap();

        assert_eq!(backend.len().unwrap(), 1);
    }

    #[test]
    fn file_empty_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blob");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.write_at(0, b"hello").unwrap();

        let data = backend.read_at(2, 0).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn file_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blob");

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.path(), Some(path.as_path()));
    }
}
