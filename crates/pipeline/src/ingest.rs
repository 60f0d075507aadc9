//! Ingest side of the pipeline
//!
//! Every message enters through [`Ingestor`]: the admission gate is checked
//! against the process buffer watermark and, if the gate is open, the
//! payload is appended to the journal. Chunked input is reassembled first
//! and only the completed payload is appended.

use std::sync::Arc;

use bytes::Bytes;
use sluice_assembler::{ChunkAssembler, Datagram, parse_datagram};
use sluice_buffer::AdmissionGate;
use sluice_journal::CommitLogJournal;
use tracing::error;

use crate::error::Result;
use crate::metrics::{PipelineMetrics, ThrottleTracker};

/// Result of offering one message to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Appended to the journal at `offset`
    Accepted { offset: u64 },
    /// Refused by admission control; the caller may drop or retry
    Throttled,
    /// Chunk stored; the message is still incomplete
    Pending,
}

impl IngestOutcome {
    /// Whether the message reached the journal
    #[inline]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Entry point for upstream collaborators
///
/// Cloning is cheap; every clone shares the same journal, gate and
/// assembler.
#[derive(Debug, Clone)]
pub struct Ingestor {
    journal: Arc<CommitLogJournal>,
    gate: Arc<AdmissionGate>,
    assembler: Arc<ChunkAssembler>,
    metrics: Arc<PipelineMetrics>,
    throttle: Arc<ThrottleTracker>,
}

impl Ingestor {
    pub(crate) fn new(
        journal: Arc<CommitLogJournal>,
        gate: Arc<AdmissionGate>,
        assembler: Arc<ChunkAssembler>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            journal,
            gate,
            assembler,
            metrics,
            throttle: Arc::new(ThrottleTracker::new()),
        }
    }

    /// Offer one complete message
    ///
    /// The append runs inline on the caller's thread: one buffered write and
    /// a `write(2)`, plus an fsync when the journal syncs every append. With
    /// that policy a slow disk stalls the calling worker, which is the price
    /// of acknowledging only synced messages.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Journal` if the append failed. Throttling is
    /// reported through [`IngestOutcome::Throttled`], never as an error.
    pub fn ingest(&self, payload: &[u8]) -> Result<IngestOutcome> {
        if !self.gate.admit() {
            self.metrics.record_throttled();
            self.throttle
                .record_rejection(self.gate.watermark().utilization_percent());
            return Ok(IngestOutcome::Throttled);
        }

        match self.journal.append(payload) {
            Ok(offset) => {
                self.metrics.record_accepted(payload.len());
                Ok(IngestOutcome::Accepted { offset })
            }
            Err(e) => {
                self.metrics.record_append_error();
                error!(error = %e, size = payload.len(), "journal append failed");
                Err(e.into())
            }
        }
    }

    /// Offer one chunk of a larger message
    ///
    /// Returns [`IngestOutcome::Pending`] until the last chunk arrives, then
    /// ingests the reassembled payload.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Chunk` for chunks the assembler rejects and
    /// `PipelineError::Journal` if the completed message cannot be appended.
    pub fn on_chunk(
        &self,
        message_id: &[u8],
        chunk_index: u8,
        total_chunks: u8,
        data: Bytes,
    ) -> Result<IngestOutcome> {
        match self
            .assembler
            .on_chunk(message_id, chunk_index, total_chunks, data)?
        {
            Some(payload) => self.ingest(&payload),
            None => Ok(IngestOutcome::Pending),
        }
    }

    /// Classify a raw datagram and route it to `ingest` or `on_chunk`
    ///
    /// # Errors
    ///
    /// Same as [`on_chunk`](Self::on_chunk); a truncated chunk header is a
    /// `PipelineError::Chunk`.
    pub fn ingest_datagram(&self, datagram: Bytes) -> Result<IngestOutcome> {
        match parse_datagram(datagram)? {
            Datagram::Whole(payload) => self.ingest(&payload),
            Datagram::Chunk(chunk) => self.on_chunk(
                &chunk.message_id,
                chunk.sequence,
                chunk.count,
                chunk.data,
            ),
        }
    }

    /// Whether admission control is currently refusing input
    pub fn is_throttled(&self) -> bool {
        self.gate.is_throttled()
    }
}

#[cfg(test)]
#[path = "ingest_test.rs"]
mod ingest_test;
