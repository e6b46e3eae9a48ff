//! Scan iterator over committed stanzas.
//!
//! The iterator is the contract the external index-rebuild process
//! depends on: after a restart it opens the blob, iterates from the first
//! stanza to the committed end pointer, and reinserts every metadata
//! record keyed by its base offset. Payloads are never read during a
//! scan.

use crate::blob::marker::FIRST_STANZA_OFFSET;
use crate::blob::store::Blob;
use crate::error::BlobResult;
use crate::types::BaseOffset;

/// A forward-only cursor over the committed stanzas of a blob.
///
/// Yields each stanza's base offset and metadata record in base-offset
/// order. The committed end pointer is captured when the iterator is
/// created, so stanzas committed afterwards are not visited; construct a
/// fresh iterator to re-derive the full sequence.
///
/// The cursor is a plain position marker: it borrows the blob only for
/// the duration of each call and owns no file state.
///
/// # Errors during iteration
///
/// A descriptor that fails to decode, or one whose computed next offset
/// lands past the captured end pointer (a sizing bug or truncated file),
/// yields `Err(CorruptStanza)` and ends the iteration. Corruption is
/// never silently skipped.
///
/// # Example
///
/// ```no_run
/// use tileblob_core::Blob;
/// use std::path::Path;
///
/// let blob = Blob::open_read_only(Path::new("tiles.blob")).unwrap();
/// for entry in blob.iter() {
///     let (offset, metadata) = entry.unwrap();
///     // Reinsert into the index keyed by offset...
///     let _ = (offset, metadata);
/// }
/// ```
pub struct StanzaIterator<'a> {
    /// The blob being scanned.
    blob: &'a Blob,
    /// Base offset of the stanza at the cursor.
    current: u64,
    /// Committed end pointer captured at creation.
    end: u64,
    /// Whether the scan has ended or failed.
    finished: bool,
}

impl<'a> StanzaIterator<'a> {
    pub(crate) fn new(blob: &'a Blob, end: u64) -> Self {
        Self {
            blob,
            current: FIRST_STANZA_OFFSET,
            end,
            finished: end <= FIRST_STANZA_OFFSET,
        }
    }

    /// Base offset of the stanza at the cursor (the next to be yielded).
    ///
    /// Once the scan is exhausted this equals the captured end pointer.
    #[must_use]
    pub fn current_base_offset(&self) -> BaseOffset {
        BaseOffset::new(self.current)
    }

    /// Payload size of the stanza at the cursor, without reading the
    /// payload.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BlobError::OutOfRange`] once the scan is
    /// exhausted, or [`crate::BlobError::CorruptStanza`] if the
    /// descriptor at the cursor fails to decode.
    pub fn data_size(&self) -> BlobResult<u64> {
        Ok(self
            .blob
            .descriptor_within(self.current, self.end)?
            .data_size)
    }

    fn read_next(&mut self) -> BlobResult<Option<(BaseOffset, Vec<u8>)>> {
        if self.finished {
            return Ok(None);
        }

        let base = self.current;
        let descriptor = self.blob.descriptor_within(base, self.end)?;
        let header = self
            .blob
            .read_exact_at(base + descriptor.header_offset, descriptor.header_size as usize)?;

        // descriptor_within bounds the stanza against the captured end,
        // so the next base offset is at most `end`.
        self.current = base + descriptor.stanza_len();
        if self.current == self.end {
            self.finished = true;
        }

        Ok(Some((BaseOffset::new(base), header)))
    }
}

impl Iterator for StanzaIterator<'_> {
    type Item = BlobResult<(BaseOffset, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl std::fmt::Debug for StanzaIterator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StanzaIterator")
            .field("current", &self.current)
            .field("end", &self.end)
            .field("finished", &self.finished)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::marker::encode_marker;
    use crate::blob::stanza::{encode_stanza, StanzaDescriptor};
    use crate::config::BlobConfig;
    use crate::error::BlobError;
    use std::collections::BTreeMap;
    use tileblob_storage::InMemoryBackend;

    fn create_blob() -> Blob {
        Blob::with_backend(Box::new(InMemoryBackend::new()), BlobConfig::default()).unwrap()
    }

    #[test]
    fn empty_blob_yields_nothing() {
        let blob = create_blob();
        assert_eq!(blob.iter().count(), 0);
    }

    #[test]
    fn single_stanza() {
        let blob = create_blob();
        let offset = blob.write(b"only", b"payload").unwrap();

        let entries: Vec<_> = blob.iter().map(|r| r.unwrap()).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, offset);
        assert_eq!(entries[0].1, b"only");
    }

    #[test]
    fn full_scan_visits_every_stanza_in_order() {
        let blob = create_blob();

        let mut written = Vec::new();
        for i in 0..20u8 {
            let header = vec![i; 3 + usize::from(i % 5)];
            let data = vec![i; 50 + usize::from(i)];
            let offset = blob.write(&header, &data).unwrap();
            written.push((offset, header));
        }

        let scanned: Vec<_> = blob.iter().map(|r| r.unwrap()).collect();
        assert_eq!(scanned, written);
    }

    #[test]
    fn index_rebuild_from_scan() {
        let blob = create_blob();

        let mut expected = BTreeMap::new();
        for i in 0..10u8 {
            let header = format!("tile:{i}");
            let offset = blob.write(header.as_bytes(), &[i; 16]).unwrap();
            expected.insert(offset, header.into_bytes());
        }

        let mut index = BTreeMap::new();
        for entry in blob.iter() {
            let (offset, metadata) = entry.unwrap();
            index.insert(offset, metadata);
        }

        assert_eq!(index, expected);
    }

    #[test]
    fn iterator_snapshot_excludes_later_writes() {
        let blob = create_blob();
        blob.write(b"a", b"1").unwrap();

        let iter = blob.iter();
        blob.write(b"b", b"2").unwrap();

        assert_eq!(iter.count(), 1);
        assert_eq!(blob.iter().count(), 2);
    }

    #[test]
    fn cursor_tracks_base_offsets() {
        let blob = create_blob();
        let first = blob.write(b"a", b"11").unwrap();
        let second = blob.write(b"b", b"22").unwrap();

        let mut iter = blob.iter();
        assert_eq!(iter.current_base_offset(), first);

        iter.next().unwrap().unwrap();
        assert_eq!(iter.current_base_offset(), second);

        iter.next().unwrap().unwrap();
        assert_eq!(iter.current_base_offset().as_u64(), blob.size());
        assert!(iter.next().is_none());
    }

    #[test]
    fn data_size_probe_at_cursor() {
        let blob = create_blob();
        blob.write(b"a", &[0; 17]).unwrap();

        let iter = blob.iter();
        assert_eq!(iter.data_size().unwrap(), 17);
    }

    #[test]
    fn data_size_after_exhaustion_is_out_of_range() {
        let blob = create_blob();
        blob.write(b"a", b"1").unwrap();

        let mut iter = blob.iter();
        iter.next().unwrap().unwrap();

        assert!(matches!(iter.data_size(), Err(BlobError::OutOfRange { .. })));
    }

    #[test]
    fn garbage_stanza_region_is_corrupt() {
        // A marker committing ten bytes of garbage as stanza data.
        let mut image = encode_marker(34).to_vec();
        image.extend_from_slice(&[0xEE; 10]);

        let blob = Blob::with_backend(
            Box::new(InMemoryBackend::with_data(image)),
            BlobConfig::default().read_only(true),
        )
        .unwrap();

        let mut iter = blob.iter();
        let first = iter.next().unwrap();
        assert!(matches!(first, Err(BlobError::CorruptStanza { .. })));

        // Corruption ends the scan.
        assert!(iter.next().is_none());
    }

    #[test]
    fn stanza_reaching_past_committed_end_is_corrupt() {
        // A well-formed descriptor whose payload claims more bytes than
        // the marker committed.
        let descriptor = StanzaDescriptor::for_parts(4, 1000);
        let (_, stanza) = encode_stanza(b"meta", &[0xAB; 1000]);

        let committed = 24 + descriptor.stanza_len() - 500;
        let mut image = encode_marker(committed).to_vec();
        image.extend_from_slice(&stanza[..(committed - 24) as usize]);

        let blob = Blob::with_backend(
            Box::new(InMemoryBackend::with_data(image)),
            BlobConfig::default().read_only(true),
        )
        .unwrap();

        let mut iter = blob.iter();
        let first = iter.next().unwrap();
        assert!(matches!(first, Err(BlobError::CorruptStanza { .. })));
    }
}
