//! Pipeline error types

use thiserror::Error;

use sluice_assembler::ChunkError;
use sluice_journal::JournalError;
use sluice_sinks::SinkError;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Journal append, read or maintenance failed
    #[error(transparent)]
    Journal(#[from] JournalError),

    /// Chunk rejected by the assembler
    #[error("chunk rejected: {0}")]
    Chunk(#[from] ChunkError),

    /// Configured sink could not be built
    #[error("sink setup failed: {0}")]
    Sink(#[from] SinkError),

    /// A pipeline task panicked or was aborted
    #[error("pipeline task '{name}' failed: {reason}")]
    Task {
        /// Task name
        name: &'static str,
        /// Join error description
        reason: String,
    },
}

impl PipelineError {
    /// Whether the error came from malformed input rather than the pipeline
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Chunk(e) if e.is_malformed())
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
