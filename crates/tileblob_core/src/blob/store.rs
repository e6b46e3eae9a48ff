//! The blob handle: writer, reader, and bulk file transfer.

use crate::blob::iterator::StanzaIterator;
use crate::blob::marker::{decode_marker, encode_marker, FIRST_STANZA_OFFSET, MARKER_REGION_SIZE};
use crate::blob::stanza::{encode_stanza, StanzaDescriptor, DESCRIPTOR_SIZE, LENGTH_PREFIX_SIZE};
use crate::config::BlobConfig;
use crate::error::{BlobError, BlobResult};
use crate::types::{BaseOffset, SendfileParams};
use parking_lot::{Mutex, RwLock};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tileblob_storage::{FileBackend, StorageBackend};
use tracing::{debug, trace};

/// Chunk size for bulk file transfers.
const TRANSFER_CHUNK_SIZE: usize = 64 * 1024; // 64 KiB

/// A single-file append-only store of tile stanzas.
///
/// A `Blob` holds variable-length payloads plus per-stanza metadata
/// records, both opaque to this crate. Every successful [`Blob::write`]
/// appends one stanza, commits the end-of-file marker, and returns the
/// stanza's [`BaseOffset`] - the stable locator an external index keeps.
///
/// # Crash consistency
///
/// Stanza bytes are written and made durable *before* the marker region
/// is rewritten. A crash between the two leaves the committed end pointer
/// unchanged: the partial stanza is stranded past it, invisible to every
/// reader, and the next successful write overwrites it at the same base
/// offset.
///
/// # Concurrency
///
/// All methods take `&self`; the backend is guarded internally. The
/// caller is expected to serialize writes to a given blob ([`write_count`]
/// lets it detect interleaving); reads may run concurrently with each
/// other and with a single in-progress write. A long-lived reader that
/// wants to observe a concurrent writer's commits calls [`refresh`].
///
/// [`write_count`]: Blob::write_count
/// [`refresh`]: Blob::refresh
///
/// # Example
///
/// ```no_run
/// use tileblob_core::Blob;
/// use std::path::Path;
///
/// let blob = Blob::open(Path::new("tiles.blob")).unwrap();
/// let offset = blob.write(b"tile metadata", b"tile bytes").unwrap();
/// assert_eq!(blob.read_data(offset).unwrap(), b"tile bytes");
/// ```
pub struct Blob {
    /// Storage backend holding the blob bytes.
    backend: Mutex<Box<dyn StorageBackend>>,
    /// Cached committed end-of-file pointer.
    end_ptr: RwLock<u64>,
    /// Number of successful writes through this handle.
    write_count: AtomicU64,
    /// Whether the blob was opened read-only.
    read_only: bool,
    /// Whether to fsync on every commit.
    sync_on_commit: bool,
}

impl Blob {
    /// Opens or creates a blob file for reading and writing.
    ///
    /// Takes an exclusive advisory lock on the file; a fresh (empty) file
    /// gets an initial marker committing an empty blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, another process
    /// holds the lock, or an existing marker region fails to validate.
    pub fn open(path: &Path) -> BlobResult<Self> {
        Self::open_with_config(path, BlobConfig::default())
    }

    /// Opens an existing blob file for reading only.
    ///
    /// Takes no lock, so it can run alongside a writer in another
    /// process; the committed end pointer is captured once at open and
    /// only moves on [`Blob::refresh`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or its marker region
    /// fails to validate.
    pub fn open_read_only(path: &Path) -> BlobResult<Self> {
        Self::open_with_config(path, BlobConfig::default().read_only(true))
    }

    /// Opens a blob file with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened (or is missing and
    /// `create_if_missing` is off), another process holds the write lock,
    /// or the marker region fails to validate.
    pub fn open_with_config(path: &Path, config: BlobConfig) -> BlobResult<Self> {
        let backend: Box<dyn StorageBackend> = if config.read_only {
            Box::new(FileBackend::open_read_only(path)?)
        } else {
            if !config.create_if_missing && !path.exists() {
                return Err(BlobError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("blob file does not exist: {}", path.display()),
                )));
            }
            Box::new(FileBackend::open_exclusive(path)?)
        };

        Self::from_backend(backend, config)
    }

    /// Creates a blob over an arbitrary storage backend.
    ///
    /// Intended for tests and ephemeral blobs over
    /// [`tileblob_storage::InMemoryBackend`]; the same open-time marker
    /// validation applies.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend's existing marker region fails to
    /// validate.
    pub fn with_backend(
        backend: Box<dyn StorageBackend>,
        config: BlobConfig,
    ) -> BlobResult<Self> {
        Self::from_backend(backend, config)
    }

    fn from_backend(
        mut backend: Box<dyn StorageBackend>,
        config: BlobConfig,
    ) -> BlobResult<Self> {
        let physical = backend.len()?;

        let end_ptr = if physical == 0 && !config.read_only {
            // Fresh blob: commit the empty marker before anything else.
            backend.write_at(0, &encode_marker(FIRST_STANZA_OFFSET))?;
            backend.flush()?;
            if config.sync_on_commit {
                backend.sync()?;
            }
            FIRST_STANZA_OFFSET
        } else {
            if physical < MARKER_REGION_SIZE {
                return Err(BlobError::corrupt_marker(format!(
                    "file too short for marker region: {physical} bytes"
                )));
            }
            let ptr = decode_marker(&backend.read_at(0, MARKER_REGION_SIZE as usize)?)?;
            if ptr < FIRST_STANZA_OFFSET || ptr > physical {
                return Err(BlobError::corrupt_marker(format!(
                    "committed end pointer {ptr} outside file bounds ({physical} bytes)"
                )));
            }
            ptr
        };

        debug!(end_ptr, read_only = config.read_only, "opened blob");

        Ok(Self {
            backend: Mutex::new(backend),
            end_ptr: RwLock::new(end_ptr),
            write_count: AtomicU64::new(0),
            read_only: config.read_only,
            sync_on_commit: config.sync_on_commit,
        })
    }

    /// Returns the committed logical size of the blob in bytes.
    ///
    /// Only counts committed stanzas; bytes stranded past the end pointer
    /// by a crashed write are not included. This is also the base offset
    /// the next successful write will return.
    #[must_use]
    pub fn size(&self) -> u64 {
        *self.end_ptr.read()
    }

    /// Returns the number of successful writes through this handle.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Returns whether the blob was opened read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns the path of the blob file, if the storage has one.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self.backend.lock().path().map(Path::to_path_buf)
    }

    /// Re-reads the marker region from storage and updates the cached
    /// end pointer.
    ///
    /// This is how a long-lived read-only handle observes commits made by
    /// a writer in another process. Returns the refreshed logical size.
    ///
    /// # Errors
    ///
    /// Returns [`BlobError::CorruptMarker`] if the on-disk marker fails to
    /// validate, or a storage error if it cannot be read.
    pub fn refresh(&self) -> BlobResult<u64> {
        let backend = self.backend.lock();
        let physical = backend.len()?;
        if physical < MARKER_REGION_SIZE {
            return Err(BlobError::corrupt_marker(format!(
                "file too short for marker region: {physical} bytes"
            )));
        }

        let ptr = decode_marker(&backend.read_at(0, MARKER_REGION_SIZE as usize)?)?;
        if ptr < FIRST_STANZA_OFFSET || ptr > physical {
            return Err(BlobError::corrupt_marker(format!(
                "committed end pointer {ptr} outside file bounds ({physical} bytes)"
            )));
        }

        *self.end_ptr.write() = ptr;
        Ok(ptr)
    }

    /// Appends one stanza - metadata record plus payload - and commits it.
    ///
    /// On success the returned base offset is immediately valid for
    /// [`Blob::read_header`], [`Blob::read_data`], and iteration, including
    /// from a fresh handle in another process.
    ///
    /// # Errors
    ///
    /// Returns [`BlobError::ReadOnly`] if the blob was opened read-only,
    /// or a storage error if any write or flush fails. An I/O failure
    /// before the marker commit leaves the logical blob state unchanged.
    pub fn write(&self, header: &[u8], data: &[u8]) -> BlobResult<BaseOffset> {
        if self.read_only {
            return Err(BlobError::ReadOnly);
        }

        let (descriptor, encoded) = encode_stanza(header, data);

        let mut backend = self.backend.lock();
        let base = *self.end_ptr.read();

        // Stanza bytes must be durable before the marker moves.
        backend.write_at(base, &encoded)?;
        backend.flush()?;
        if self.sync_on_commit {
            backend.sync()?;
        }

        let new_end = base + descriptor.stanza_len();
        self.commit(&mut backend, new_end)?;
        *self.end_ptr.write() = new_end;

        let count = self.write_count.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(base, new_end, count, "committed stanza");

        Ok(BaseOffset::new(base))
    }

    /// Reads the metadata record of the stanza at `base_offset`.
    ///
    /// # Errors
    ///
    /// Returns [`BlobError::OutOfRange`] if `base_offset` does not lie in
    /// the committed stanza region, or [`BlobError::CorruptStanza`] if the
    /// descriptor there fails to decode.
    pub fn read_header(&self, base_offset: BaseOffset) -> BlobResult<Vec<u8>> {
        let base = base_offset.as_u64();
        let end = *self.end_ptr.read();
        Self::check_range(base, end)?;

        let backend = self.backend.lock();
        let descriptor = Self::descriptor_locked(&**backend, base, end)?;
        Ok(backend.read_at(base + descriptor.header_offset, descriptor.header_size as usize)?)
    }

    /// Reads the payload of the stanza at `base_offset`.
    ///
    /// The returned buffer is an independent, immutable copy owned by the
    /// caller.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Blob::read_header`].
    pub fn read_data(&self, base_offset: BaseOffset) -> BlobResult<Vec<u8>> {
        let base = base_offset.as_u64();
        let end = *self.end_ptr.read();
        Self::check_range(base, end)?;

        let backend = self.backend.lock();
        let descriptor = Self::descriptor_locked(&**backend, base, end)?;
        Ok(backend.read_at(base + descriptor.data_offset, descriptor.data_size as usize)?)
    }

    /// Returns the payload size of the stanza at `base_offset` without
    /// reading the payload.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Blob::read_header`].
    pub fn data_size(&self, base_offset: BaseOffset) -> BlobResult<u64> {
        let end = *self.end_ptr.read();
        let descriptor = self.descriptor_within(base_offset.as_u64(), end)?;
        Ok(descriptor.data_size)
    }

    /// Returns the parameters for an OS-level zero-copy transfer of the
    /// payload at `base_offset`.
    ///
    /// The payload is never copied into process memory; the caller hands
    /// the path/offset/length triple to `sendfile(2)` or an equivalent.
    ///
    /// # Errors
    ///
    /// Returns [`BlobError::SendfileUnavailable`] if the storage has no
    /// backing file, plus the conditions of [`Blob::read_header`].
    pub fn read_sendfile(&self, base_offset: BaseOffset) -> BlobResult<SendfileParams> {
        let base = base_offset.as_u64();
        let end = *self.end_ptr.read();
        Self::check_range(base, end)?;

        let backend = self.backend.lock();
        let descriptor = Self::descriptor_locked(&**backend, base, end)?;
        let path = backend
            .path()
            .ok_or(BlobError::SendfileUnavailable)?
            .to_path_buf();

        Ok(SendfileParams {
            path,
            offset: base + descriptor.data_offset,
            len: descriptor.data_size,
        })
    }

    /// Returns an iterator over the metadata records of all committed
    /// stanzas, in base-offset order.
    ///
    /// The committed end pointer is captured at creation; stanzas
    /// committed afterwards are not visited. A fresh iterator can always
    /// be constructed to re-derive the full sequence, which is how an
    /// external index rebuilds itself after a restart.
    #[must_use]
    pub fn iter(&self) -> StanzaIterator<'_> {
        StanzaIterator::new(self, *self.end_ptr.read())
    }

    /// Materializes the payload at `base_offset` into a standalone file,
    /// byte for byte.
    ///
    /// The payload is streamed in bounded chunks; it is never fully
    /// resident in memory.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Blob::read_data`], plus I/O errors writing the
    /// destination file.
    pub fn read_to_file(&self, dest: &Path, base_offset: BaseOffset) -> BlobResult<()> {
        let base = base_offset.as_u64();
        let end = *self.end_ptr.read();
        Self::check_range(base, end)?;

        let backend = self.backend.lock();
        let descriptor = Self::descriptor_locked(&**backend, base, end)?;

        let mut file = File::create(dest)?;
        let mut offset = base + descriptor.data_offset;
        let mut remaining = descriptor.data_size;

        while remaining > 0 {
            let chunk = remaining.min(TRANSFER_CHUNK_SIZE as u64) as usize;
            let bytes = backend.read_at(offset, chunk)?;
            file.write_all(&bytes)?;
            offset += chunk as u64;
            remaining -= chunk as u64;
        }

        file.sync_all()?;
        Ok(())
    }

    /// Reads a payload from a standalone file and appends it as a stanza,
    /// equivalent to [`Blob::write`] with the file's contents.
    ///
    /// The payload is streamed in bounded chunks; the caller never needs
    /// to hold it in memory at once.
    ///
    /// # Errors
    ///
    /// Returns [`BlobError::ReadOnly`] if the blob was opened read-only,
    /// or an I/O or storage error. An I/O failure before the marker
    /// commit leaves the logical blob state unchanged.
    pub fn write_from_file(&self, source: &Path, header: &[u8]) -> BlobResult<BaseOffset> {
        if self.read_only {
            return Err(BlobError::ReadOnly);
        }

        let mut file = File::open(source)?;
        let data_size = file.metadata()?.len();
        let descriptor = StanzaDescriptor::for_parts(header.len() as u64, data_size);

        let mut backend = self.backend.lock();
        let base = *self.end_ptr.read();

        let mut head = descriptor.encode_prefixed();
        head.extend_from_slice(header);
        backend.write_at(base, &head)?;

        let mut offset = base + descriptor.data_offset;
        let mut remaining = data_size;
        let mut buf = vec![0u8; TRANSFER_CHUNK_SIZE];

        while remaining > 0 {
            let chunk = remaining.min(TRANSFER_CHUNK_SIZE as u64) as usize;
            file.read_exact(&mut buf[..chunk])?;
            backend.write_at(offset, &buf[..chunk])?;
            offset += chunk as u64;
            remaining -= chunk as u64;
        }

        backend.flush()?;
        if self.sync_on_commit {
            backend.sync()?;
        }

        let new_end = base + descriptor.stanza_len();
        self.commit(&mut backend, new_end)?;
        *self.end_ptr.write() = new_end;

        let count = self.write_count.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(base, new_end, count, source = %source.display(), "committed stanza from file");

        Ok(BaseOffset::new(base))
    }

    /// Rewrites the marker region with `new_end` and makes it durable.
    ///
    /// Must only be called after the stanza bytes below `new_end` are
    /// fully written and flushed.
    fn commit(&self, backend: &mut Box<dyn StorageBackend>, new_end: u64) -> BlobResult<()> {
        backend.write_at(0, &encode_marker(new_end))?;
        backend.flush()?;
        if self.sync_on_commit {
            backend.sync()?;
        }
        Ok(())
    }

    fn check_range(base: u64, end: u64) -> BlobResult<()> {
        if base < FIRST_STANZA_OFFSET || base >= end {
            return Err(BlobError::OutOfRange {
                offset: base,
                start: FIRST_STANZA_OFFSET,
                end,
            });
        }
        Ok(())
    }

    /// Decodes the descriptor at `base`, bounding every region against the
    /// committed end pointer `end`.
    pub(crate) fn descriptor_within(&self, base: u64, end: u64) -> BlobResult<StanzaDescriptor> {
        Self::check_range(base, end)?;
        let backend = self.backend.lock();
        Self::descriptor_locked(&**backend, base, end)
    }

    /// Reads raw committed bytes; used by the scan iterator.
    pub(crate) fn read_exact_at(&self, offset: u64, len: usize) -> BlobResult<Vec<u8>> {
        let backend = self.backend.lock();
        Ok(backend.read_at(offset, len)?)
    }

    fn descriptor_locked(
        backend: &dyn StorageBackend,
        base: u64,
        end: u64,
    ) -> BlobResult<StanzaDescriptor> {
        let available = end - base;
        let want = (LENGTH_PREFIX_SIZE + DESCRIPTOR_SIZE).min(available) as usize;
        let bytes = backend.read_at(base, want)?;
        let (descriptor, _) = StanzaDescriptor::decode(&bytes, base)?;

        let stanza_end = base
            .checked_add(descriptor.stanza_len())
            .ok_or_else(|| BlobError::corrupt_stanza(base, "stanza length overflows"))?;
        if stanza_end > end {
            return Err(BlobError::corrupt_stanza(
                base,
                format!("stanza ends at {stanza_end}, past the committed end {end}"),
            ));
        }

        Ok(descriptor)
    }
}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob")
            .field("size", &self.size())
            .field("write_count", &self.write_count())
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}
