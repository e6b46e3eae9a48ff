//! Shared helpers for tileblob benchmarks.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Creates deterministic pseudo-payload data of the given size.
#[must_use]
pub fn tile_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// Creates a small deterministic metadata record for benchmark stanzas.
#[must_use]
pub fn tile_metadata(index: u64) -> Vec<u8> {
    format!("tile:level=4:col={}:row={}", index % 16, index / 16).into_bytes()
}
