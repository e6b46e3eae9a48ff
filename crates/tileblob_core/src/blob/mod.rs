//! The blob file format and its operations.
//!
//! A blob is one append-only file holding committed stanzas behind a
//! fixed marker region:
//!
//! ```text
//! | marker region: 3 x u64 committed end pointer (24 bytes)          |
//! | stanza | stanza | stanza | ... | <committed end> | untrusted ... |
//!
//! stanza:
//! | u16 descriptor length | descriptor (32) | metadata record | payload |
//! ```
//!
//! The descriptor holds header_offset / header_size / data_offset /
//! data_size, all relative to the stanza's base offset. Stanzas pack
//! back to back; the next base offset is always
//! `base + data_offset + data_size`.
//!
//! ## Commit protocol
//!
//! The marker region is the single source of truth for how much of the
//! file is valid. A write appends the full stanza past the committed end
//! pointer, makes it durable, and only then rewrites the marker. Readers
//! therefore always see either the old or the new committed state:
//!
//! - crash before the marker update: the logical size is unchanged, the
//!   half-written stanza sits past the pointer and is ignored; the next
//!   write reuses its base offset
//! - crash after: the stanza is fully committed
//!
//! ## Corruption policy
//!
//! - **Disagreeing marker words** -> `CorruptMarker`; surfaced, never
//!   repaired by majority vote
//! - **Undecodable descriptor / impossible sizes / stanza past the
//!   committed end** -> `CorruptStanza`; fatal to the operation, never
//!   silently skipped
//! - **Offsets outside the committed region** -> `OutOfRange`
//!
//! ## Invariants
//!
//! - Stanzas at offsets below the committed end pointer are **immutable
//!   forever**
//! - The committed end pointer only moves forward, and only after the
//!   bytes below it are durable
//! - Bytes at or past the pointer are never trusted, even if physically
//!   present

mod iterator;
mod marker;
mod stanza;
mod store;

pub use iterator::StanzaIterator;
pub use marker::{FIRST_STANZA_OFFSET, MARKER_REGION_SIZE, MARKER_WORDS};
pub use stanza::{StanzaDescriptor, DESCRIPTOR_SIZE, LENGTH_PREFIX_SIZE};
pub use store::Blob;
