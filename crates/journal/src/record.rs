//! On-disk record format
//!
//! Each record is a fixed 24-byte big-endian header followed by the payload:
//!
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────────┬─────────────┐
//! │ offset   │ length   │ crc32    │ timestamp_ms │ payload     │
//! │ u64      │ u32      │ u32      │ i64          │ length bytes│
//! └──────────┴──────────┴──────────┴──────────────┴─────────────┘
//! ```
//!
//! The CRC covers the offset, length, timestamp and payload, so a record
//! that was only partly written or later damaged never validates.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use crc32fast::Hasher;

/// Size of the fixed record header
pub const RECORD_HEADER_SIZE: usize = 24;

/// One entry read back from the journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// Offset assigned at append time
    pub offset: u64,
    /// Message bytes as received
    pub payload: Bytes,
    /// Wall-clock time of the append
    pub received_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Payload length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Decoded record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub offset: u64,
    pub length: u32,
    pub crc: u32,
    pub timestamp_ms: i64,
}

impl RecordHeader {
    /// Parse a header from exactly [`RECORD_HEADER_SIZE`] bytes
    pub fn parse(buf: &[u8; RECORD_HEADER_SIZE]) -> Self {
        let mut offset = [0u8; 8];
        let mut length = [0u8; 4];
        let mut crc = [0u8; 4];
        let mut timestamp = [0u8; 8];
        offset.copy_from_slice(&buf[0..8]);
        length.copy_from_slice(&buf[8..12]);
        crc.copy_from_slice(&buf[12..16]);
        timestamp.copy_from_slice(&buf[16..24]);

        Self {
            offset: u64::from_be_bytes(offset),
            length: u32::from_be_bytes(length),
            crc: u32::from_be_bytes(crc),
            timestamp_ms: i64::from_be_bytes(timestamp),
        }
    }

    /// Total on-disk size of the record this header describes
    #[inline]
    pub fn record_len(&self) -> usize {
        RECORD_HEADER_SIZE + self.length as usize
    }

    /// Whether `payload` matches the stored checksum
    pub fn verify(&self, payload: &[u8]) -> bool {
        checksum(self.offset, self.length, self.timestamp_ms, payload) == self.crc
    }
}

/// Result of decoding one record from a byte slice
#[derive(Debug)]
pub enum Decoded {
    /// A valid record and the number of bytes it occupies
    Record(JournalEntry, usize),
    /// The slice ends before the record does
    Incomplete,
    /// The bytes do not form a valid record
    Corrupt(&'static str),
}

/// Encode a record into `buf`, replacing its contents
pub fn encode(buf: &mut BytesMut, offset: u64, timestamp_ms: i64, payload: &[u8]) {
    let length = payload.len() as u32;
    buf.clear();
    buf.reserve(RECORD_HEADER_SIZE + payload.len());
    buf.put_u64(offset);
    buf.put_u32(length);
    buf.put_u32(checksum(offset, length, timestamp_ms, payload));
    buf.put_i64(timestamp_ms);
    buf.put_slice(payload);
}

/// Decode the record at the start of `buf`
///
/// `max_payload` bounds the length field so a damaged header cannot claim
/// an absurd payload.
pub fn decode(buf: &[u8], max_payload: usize) -> Decoded {
    let Some(header_bytes) = buf.first_chunk::<RECORD_HEADER_SIZE>() else {
        return Decoded::Incomplete;
    };
    let header = RecordHeader::parse(header_bytes);

    if header.length as usize > max_payload {
        return Decoded::Corrupt("length exceeds segment size");
    }

    let total = header.record_len();
    if buf.len() < total {
        return Decoded::Incomplete;
    }

    let payload = &buf[RECORD_HEADER_SIZE..total];
    if !header.verify(payload) {
        return Decoded::Corrupt("checksum mismatch");
    }

    Decoded::Record(
        JournalEntry {
            offset: header.offset,
            payload: Bytes::copy_from_slice(payload),
            received_at: timestamp_from_millis(header.timestamp_ms),
        },
        total,
    )
}

/// Convert stored milliseconds back to a timestamp
pub fn timestamp_from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn checksum(offset: u64, length: u32, timestamp_ms: i64, payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&offset.to_be_bytes());
    hasher.update(&length.to_be_bytes());
    hasher.update(&timestamp_ms.to_be_bytes());
    hasher.update(payload);
    hasher.finalize()
}
