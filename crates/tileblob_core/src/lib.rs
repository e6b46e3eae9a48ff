//! # tileblob Core
//!
//! Single-file append-only tile payload store with crash-safe commits.
//!
//! A [`Blob`] is the durable payload layer of a tiled-pyramid tile store:
//! it accepts a tile's metadata record and raw bytes, appends them as a
//! stanza, and returns a stable [`BaseOffset`] that an external index
//! keeps to find the tile again. Given that locator it serves the
//! metadata, the payload, or zero-copy transfer parameters; a restartable
//! [`StanzaIterator`] lets the index rebuild itself from file contents
//! alone.
//!
//! This crate provides:
//! - The on-disk stanza and marker layouts ([`StanzaDescriptor`])
//! - The atomic commit protocol for the end-of-file marker
//! - Writer, reader, and scan iterator over one blob file
//! - Bulk transfer of payloads to and from standalone files
//!
//! Tile semantics (coordinates, levels, compression) and the index
//! structure live in external collaborators; metadata records and
//! payloads are opaque bytes here.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod blob;
mod config;
mod error;
mod types;

pub use blob::{
    Blob, StanzaDescriptor, StanzaIterator, DESCRIPTOR_SIZE, FIRST_STANZA_OFFSET,
    LENGTH_PREFIX_SIZE, MARKER_REGION_SIZE, MARKER_WORDS,
};
pub use config::BlobConfig;
pub use error::{BlobError, BlobResult};
pub use types::{BaseOffset, SendfileParams};
