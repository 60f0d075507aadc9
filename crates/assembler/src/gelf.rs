//! GELF chunk header
//!
//! Chunked GELF datagrams carry a 12-byte header in front of the data:
//!
//! ```text
//! ┌──────────┬──────────────┬──────────┬──────────┬──────────┐
//! │ 0x1e 0x0f│ message id   │ sequence │ count    │ data ... │
//! │ 2 bytes  │ 8 bytes      │ u8       │ u8       │          │
//! └──────────┴──────────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! Anything that does not start with the magic bytes is a whole message.
//! Payload decompression is left to whoever consumes the journal.

use bytes::Bytes;

use crate::error::ChunkError;

/// Magic bytes that mark a chunked datagram
pub const CHUNK_MAGIC: [u8; 2] = [0x1e, 0x0f];

/// Size of the chunk header
pub const CHUNK_HEADER_SIZE: usize = 12;

/// One chunk of a larger message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GelfChunk {
    pub message_id: [u8; 8],
    pub sequence: u8,
    pub count: u8,
    pub data: Bytes,
}

/// A parsed datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datagram {
    /// Part of a chunked message
    Chunk(GelfChunk),
    /// Complete message
    Whole(Bytes),
}

/// Classify a datagram and split off the chunk header if present
pub fn parse_datagram(datagram: Bytes) -> Result<Datagram, ChunkError> {
    if !datagram.starts_with(&CHUNK_MAGIC) {
        return Ok(Datagram::Whole(datagram));
    }

    let Some(header) = datagram.first_chunk::<CHUNK_HEADER_SIZE>() else {
        return Err(ChunkError::TruncatedHeader {
            len: datagram.len(),
        });
    };

    let mut message_id = [0u8; 8];
    message_id.copy_from_slice(&header[2..10]);
    let sequence = header[10];
    let count = header[11];

    Ok(Datagram::Chunk(GelfChunk {
        message_id,
        sequence,
        count,
        data: datagram.slice(CHUNK_HEADER_SIZE..),
    }))
}

/// Build a chunk datagram; used by tests and load generators
pub fn encode_chunk(message_id: [u8; 8], sequence: u8, count: u8, data: &[u8]) -> Bytes {
    let mut buf = Vec::with_capacity(CHUNK_HEADER_SIZE + data.len());
    buf.extend_from_slice(&CHUNK_MAGIC);
    buf.extend_from_slice(&message_id);
    buf.push(sequence);
    buf.push(count);
    buf.extend_from_slice(data);
    buf.into()
}
