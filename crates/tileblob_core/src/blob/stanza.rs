//! Stanza layout: the length-prefixed descriptor and on-disk encoding.

use crate::error::{BlobError, BlobResult};

/// Size of the 16-bit length prefix preceding every stanza descriptor.
pub const LENGTH_PREFIX_SIZE: u64 = 2;

/// Encoded size of a stanza descriptor: four 64-bit little-endian words.
pub const DESCRIPTOR_SIZE: u64 = 32;

/// Describes where a stanza's metadata record and payload live.
///
/// All offsets are relative to the stanza's base offset, so a descriptor
/// is valid wherever the stanza lands in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StanzaDescriptor {
    /// Offset of the metadata record.
    pub header_offset: u64,
    /// Length of the metadata record in bytes.
    pub header_size: u64,
    /// Offset of the payload.
    pub data_offset: u64,
    /// Length of the payload in bytes.
    pub data_size: u64,
}

impl StanzaDescriptor {
    /// Builds the descriptor for a stanza laid out in on-disk order:
    /// length prefix, descriptor, metadata record, payload.
    #[must_use]
    pub fn for_parts(header_size: u64, data_size: u64) -> Self {
        let header_offset = LENGTH_PREFIX_SIZE + DESCRIPTOR_SIZE;
        Self {
            header_offset,
            header_size,
            data_offset: header_offset + header_size,
            data_size,
        }
    }

    /// Total on-disk length of the stanza, from its base offset to the
    /// first byte of the next stanza.
    #[must_use]
    pub fn stanza_len(&self) -> u64 {
        self.data_offset + self.data_size
    }

    /// Encodes the descriptor body (without the length prefix).
    #[must_use]
    pub fn encode(&self) -> [u8; DESCRIPTOR_SIZE as usize] {
        let mut buf = [0u8; DESCRIPTOR_SIZE as usize];
        buf[0..8].copy_from_slice(&self.header_offset.to_le_bytes());
        buf[8..16].copy_from_slice(&self.header_size.to_le_bytes());
        buf[16..24].copy_from_slice(&self.data_offset.to_le_bytes());
        buf[24..32].copy_from_slice(&self.data_size.to_le_bytes());
        buf
    }

    /// Encodes the length prefix followed by the descriptor body.
    #[must_use]
    pub fn encode_prefixed(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity((LENGTH_PREFIX_SIZE + DESCRIPTOR_SIZE) as usize);
        buf.extend_from_slice(&(DESCRIPTOR_SIZE as u16).to_le_bytes());
        buf.extend_from_slice(&self.encode());
        buf
    }

    /// Decodes the length-prefixed descriptor at the start of `bytes`.
    ///
    /// `bytes` must be clipped to the committed region starting at the
    /// stanza's base offset, so a declared length reaching past the
    /// committed end is detected here. `base_offset` is carried for error
    /// context only. Returns the descriptor and the number of bytes
    /// consumed (prefix plus body).
    ///
    /// # Errors
    ///
    /// Returns [`BlobError::CorruptStanza`] if the declared length is zero,
    /// doesn't match the descriptor size, extends past `bytes`, or the
    /// decoded fields are internally inconsistent.
    pub fn decode(bytes: &[u8], base_offset: u64) -> BlobResult<(Self, u64)> {
        if bytes.len() < LENGTH_PREFIX_SIZE as usize {
            return Err(BlobError::corrupt_stanza(
                base_offset,
                "truncated descriptor length prefix",
            ));
        }

        let declared = u64::from(u16::from_le_bytes([bytes[0], bytes[1]]));
        if declared == 0 {
            return Err(BlobError::corrupt_stanza(
                base_offset,
                "descriptor length is zero",
            ));
        }
        if declared != DESCRIPTOR_SIZE {
            return Err(BlobError::corrupt_stanza(
                base_offset,
                format!("descriptor length {declared} does not match the fixed size {DESCRIPTOR_SIZE}"),
            ));
        }

        let consumed = (LENGTH_PREFIX_SIZE + DESCRIPTOR_SIZE) as usize;
        if bytes.len() < consumed {
            return Err(BlobError::corrupt_stanza(
                base_offset,
                format!(
                    "descriptor extends past the committed region: need {consumed} bytes, have {}",
                    bytes.len()
                ),
            ));
        }

        let word = |index: usize| {
            let start = LENGTH_PREFIX_SIZE as usize + index * 8;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[start..start + 8]);
            u64::from_le_bytes(raw)
        };

        let descriptor = Self {
            header_offset: word(0),
            header_size: word(1),
            data_offset: word(2),
            data_size: word(3),
        };
        descriptor.validate(base_offset)?;

        Ok((descriptor, consumed as u64))
    }

    /// Checks internal consistency: the metadata record and payload must
    /// follow the descriptor in order without overlapping, and no region
    /// may wrap the 64-bit offset space.
    fn validate(&self, base_offset: u64) -> BlobResult<()> {
        if self.header_offset < LENGTH_PREFIX_SIZE + DESCRIPTOR_SIZE {
            return Err(BlobError::corrupt_stanza(
                base_offset,
                "metadata record overlaps the descriptor",
            ));
        }

        let header_end = self
            .header_offset
            .checked_add(self.header_size)
            .ok_or_else(|| {
                BlobError::corrupt_stanza(base_offset, "metadata record length overflows")
            })?;

        if self.data_offset < header_end {
            return Err(BlobError::corrupt_stanza(
                base_offset,
                "payload overlaps the metadata record",
            ));
        }

        self.data_offset
            .checked_add(self.data_size)
            .ok_or_else(|| BlobError::corrupt_stanza(base_offset, "payload length overflows"))?;

        Ok(())
    }
}

/// Encodes a complete stanza in on-disk order: length prefix, descriptor,
/// metadata record, payload. Returns the descriptor alongside the bytes.
#[must_use]
pub fn encode_stanza(header: &[u8], data: &[u8]) -> (StanzaDescriptor, Vec<u8>) {
    let descriptor = StanzaDescriptor::for_parts(header.len() as u64, data.len() as u64);

    let mut buf = Vec::with_capacity(descriptor.stanza_len() as usize);
    buf.extend_from_slice(&descriptor.encode_prefixed());
    buf.extend_from_slice(header);
    buf.extend_from_slice(data);

    (descriptor, buf)
}
