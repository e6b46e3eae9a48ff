//! Storage backend trait definition.

use crate::error::StorageResult;
use std::path::Path;

/// A low-level storage backend for tileblob.
///
/// Storage backends are **opaque byte stores**. They provide positional
/// reads and writes, flushing, and syncing. tileblob_core owns all file
/// format interpretation - backends do not understand markers or stanzas.
///
/// Writes are positional rather than append-only because the blob format
/// rewrites its marker region at offset 0 on every commit, and places new
/// stanzas at the committed end pointer, which may sit below the physical
/// end after a crashed write.
///
/// # Invariants
///
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `write_at` past the physical end extends the store with a zero gap
/// - `sync` ensures all written data is durable
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The offset is beyond the current size
    /// - The read would extend beyond the current size
    /// - An I/O error occurs
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Writes `data` starting at `offset`.
    ///
    /// Writing at or past the physical end grows the store; any gap
    /// between the old end and `offset` reads back as zeroes.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is read-only or an I/O error occurs.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()>;

    /// Flushes all pending writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// This is a stronger guarantee than `flush` - after this returns
    /// successfully, all previously written data is guaranteed to survive
    /// process termination.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current physical size of the storage in bytes.
    ///
    /// Note that the physical size may exceed the logical size tracked by
    /// the format layer above (bytes stranded by a crashed write).
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn len(&self) -> StorageResult<u64>;

    /// Returns whether the storage is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns the path of the backing file, if there is one.
    ///
    /// Memory-backed stores return `None`; callers that need an OS-level
    /// handle on the data (e.g. for `sendfile(2)`) must handle that case.
    fn path(&self) -> Option<&Path> {
        None
    }
}
