//! Length-prefixed chunk decoding.
//!
//! A chunk starts with a big-endian `u32` giving its total size, length field
//! included. Decoding never reads past the end of the source buffer; any
//! inconsistency is reported as a [`ChunkError`].

use crate::error::ChunkError;
use bytes::{Buf, Bytes};
use std::ops::Range;
use tracing::trace;

/// Size of the big-endian length field heading every chunk
pub const LENGTH_FIELD_LEN: usize = 4;

/// A resource sliced out of the source buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    data: Bytes,
    range: Range<usize>,
}

impl Chunk {
    fn new(data: Bytes, range: Range<usize>) -> Self {
        Self { data, range }
    }

    /// Returns the chunk bytes, length field included
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns a cheap handle to the chunk bytes
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Byte range in the source buffer
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Offset of the length field in the source buffer
    pub fn start(&self) -> usize {
        self.range.start
    }

    /// Total chunk size as declared by its length field
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false for chunks produced by [`read_chunk`]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Reads the chunk whose length field starts at `offset`.
///
/// On success returns the chunk and the offset immediately after it, which is
/// where scanning should resume.
pub fn read_chunk(buffer: &Bytes, offset: usize) -> Result<(Chunk, usize), ChunkError> {
    let remaining = buffer.len().saturating_sub(offset);
    if remaining < LENGTH_FIELD_LEN {
        return Err(ChunkError::IncompleteHeader { offset, remaining });
    }

    let mut header = &buffer[offset..offset + LENGTH_FIELD_LEN];
    trace!(
        "Length field at {}: {}",
        offset,
        super::hex_preview(header)
    );
    let size = header.get_u32();

    let len = size as usize;
    if len < LENGTH_FIELD_LEN {
        return Err(ChunkError::UndersizedChunk { offset, size });
    }
    if len > remaining {
        return Err(ChunkError::OversizedChunk {
            offset,
            size,
            available: remaining,
        });
    }

    let range = offset..offset + len;
    let chunk = Chunk::new(buffer.slice(range.clone()), range);
    Ok((chunk, offset + len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_chunk_includes_length_field() {
        let buffer = Bytes::from_static(b"\x00\x00\x00\x08DATAtail");
        let (chunk, next) = read_chunk(&buffer, 0).unwrap();
        assert_eq!(chunk.as_bytes(), b"\x00\x00\x00\x08DATA");
        assert_eq!(chunk.range(), 0..8);
        assert_eq!(next, 8);
    }

    #[test]
    fn test_read_chunk_exactly_fills_buffer() {
        let buffer = Bytes::from_static(b"icns\x00\x00\x00\x06ab");
        let (chunk, next) = read_chunk(&buffer, 4).unwrap();
        assert_eq!(chunk.len(), 6);
        assert_eq!(chunk.start(), 4);
        assert_eq!(next, buffer.len());
    }

    #[test]
    fn test_read_chunk_header_only() {
        let buffer = Bytes::from_static(b"\x00\x00\x00\x04");
        let (chunk, next) = read_chunk(&buffer, 0).unwrap();
        assert_eq!(chunk.len(), 4);
        assert_eq!(next, 4);
    }

    #[test]
    fn test_read_chunk_incomplete_header() {
        let buffer = Bytes::from_static(b"icns\x00\x00");
        assert_eq!(
            read_chunk(&buffer, 4),
            Err(ChunkError::IncompleteHeader {
                offset: 4,
                remaining: 2
            })
        );
        assert_eq!(
            read_chunk(&buffer, 6),
            Err(ChunkError::IncompleteHeader {
                offset: 6,
                remaining: 0
            })
        );
    }

    #[test]
    fn test_read_chunk_oversized() {
        let buffer = Bytes::from_static(b"icns\xff\xff\xff\xff");
        assert_eq!(
            read_chunk(&buffer, 4),
            Err(ChunkError::OversizedChunk {
                offset: 4,
                size: u32::MAX,
                available: 4
            })
        );
    }

    #[test]
    fn test_read_chunk_off_by_one_oversized() {
        let buffer = Bytes::from_static(b"\x00\x00\x00\x09DATA");
        assert!(matches!(
            read_chunk(&buffer, 0),
            Err(ChunkError::OversizedChunk { size: 9, .. })
        ));
    }

    #[test]
    fn test_read_chunk_undersized() {
        for size in 0u8..4 {
            let buffer = Bytes::from(vec![0, 0, 0, size, 1, 2, 3]);
            assert_eq!(
                read_chunk(&buffer, 0),
                Err(ChunkError::UndersizedChunk {
                    offset: 0,
                    size: u32::from(size)
                })
            );
        }
    }
}
