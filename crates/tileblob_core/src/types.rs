//! Core type definitions for tileblob.

use std::fmt;
use std::path::PathBuf;

/// Byte offset of a stanza's first byte within a blob.
///
/// Base offsets are the stable locators handed to the external index.
/// A committed stanza never moves or changes, so its base offset
/// identifies it for the lifetime of the blob file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BaseOffset(pub u64);

impl BaseOffset {
    /// Creates a new base offset.
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self(offset)
    }

    /// Returns the raw byte offset.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BaseOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "off:{}", self.0)
    }
}

/// Parameters for an OS-level zero-copy transfer of a payload region.
///
/// These describe the payload's exact location in the underlying blob
/// file so a network-serving collaborator can hand them to `sendfile(2)`
/// (or an equivalent) without the payload ever entering process memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendfileParams {
    /// Path of the blob file.
    pub path: PathBuf,
    /// Absolute byte offset of the payload within the file.
    pub offset: u64,
    /// Payload length in bytes.
    pub len: u64,
}
