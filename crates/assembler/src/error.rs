//! Chunk reassembly errors

use thiserror::Error;

/// Why a chunk or datagram was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    /// Chunk count of zero or above the configured maximum
    #[error("chunk count {total} outside 1..={max}")]
    InvalidTotal { total: u8, max: u8 },

    /// Chunk index not below the chunk count
    #[error("chunk index {index} out of range for {total} chunks")]
    IndexOutOfRange { index: u8, total: u8 },

    /// Chunk disagrees with earlier chunks of the same message
    #[error("chunk count {got} does not match {expected} from earlier chunks")]
    TotalMismatch { expected: u8, got: u8 },

    /// Reassembled message would exceed the size limit
    #[error("message of {size} bytes exceeds the {max} byte limit")]
    MessageTooLarge { size: usize, max: usize },

    /// Too many messages are already being assembled
    #[error("too many pending messages (limit {limit})")]
    TooManyPending { limit: usize },

    /// Datagram starts with the chunk magic but is too short for the header
    #[error("chunk header truncated: {len} bytes")]
    TruncatedHeader { len: usize },
}

impl ChunkError {
    /// Whether the input itself was bad, as opposed to a capacity limit
    pub fn is_malformed(&self) -> bool {
        !matches!(self, Self::TooManyPending { .. })
    }
}
