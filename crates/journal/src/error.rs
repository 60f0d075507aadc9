//! Journal error types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for journal operations
pub type Result<T> = std::result::Result<T, JournalError>;

/// Errors returned by the commit log journal
#[derive(Debug, Error)]
pub enum JournalError {
    /// Filesystem operation failed
    #[error("journal io error on '{path}': {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Commit requested for an offset that was never appended
    #[error("cannot commit offset {offset}: log end offset is {log_end_offset}")]
    CommitBeyondEnd {
        /// Requested offset
        offset: u64,
        /// Current log end offset
        log_end_offset: u64,
    },

    /// Payload longer than the record length field can describe
    #[error("payload of {size} bytes exceeds the {max} byte record limit")]
    RecordTooLarge {
        /// Payload size
        size: u64,
        /// Largest encodable payload
        max: u64,
    },

    /// Journal was closed
    #[error("journal is closed")]
    Closed,
}

impl JournalError {
    /// Create an Io error for `path`
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
