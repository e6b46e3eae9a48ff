//! Error types for tileblob core.

use std::io;
use thiserror::Error;

/// Result type for blob operations.
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur in blob operations.
///
/// The taxonomy separates transient faults (I/O) from structural ones
/// (corruption): an [`BlobError::Io`] or [`BlobError::Storage`] may succeed
/// on retry, while the corruption variants indicate a format bug or a
/// damaged file and are fatal to the current operation. No variant is ever
/// silently recovered from inside this crate.
#[derive(Debug, Error)]
pub enum BlobError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] tileblob_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stanza failed to decode or declares an impossible size.
    #[error("corrupt stanza at offset {offset}: {message}")]
    CorruptStanza {
        /// Base offset of the stanza that failed to decode.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// The end-of-file marker region is damaged or inconsistent.
    #[error("corrupt end-of-file marker: {message}")]
    CorruptMarker {
        /// Description of the corruption.
        message: String,
    },

    /// The supplied offset is not a committed stanza start.
    #[error("offset {offset} out of range: committed stanzas lie in {start}..{end}")]
    OutOfRange {
        /// The offset that was supplied.
        offset: u64,
        /// First valid base offset.
        start: u64,
        /// The committed end-of-file pointer.
        end: u64,
    },

    /// A write operation was attempted on a blob opened read-only.
    #[error("blob is open read-only")]
    ReadOnly,

    /// Zero-copy transfer parameters were requested from a blob whose
    /// storage has no backing file.
    #[error("zero-copy transfer unavailable: storage has no backing file")]
    SendfileUnavailable,
}

impl BlobError {
    /// Creates a corrupt stanza error.
    pub fn corrupt_stanza(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptStanza {
            offset,
            message: message.into(),
        }
    }

    /// Creates a corrupt marker error.
    pub fn corrupt_marker(message: impl Into<String>) -> Self {
        Self::CorruptMarker {
            message: message.into(),
        }
    }
}
