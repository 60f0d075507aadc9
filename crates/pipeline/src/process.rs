//! Process stage
//!
//! Workers move entries from the process buffer to the output buffer
//! through a [`Processor`]. The default processor forwards every entry
//! unchanged; entries a processor drops are acknowledged right away so the
//! journal can still commit past them.

use std::sync::Arc;

use sluice_buffer::RingBuffer;
use sluice_journal::JournalEntry;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::ack::AckTracker;
use crate::metrics::PipelineMetrics;

/// Entries a worker takes from the process buffer at once
const WORKER_BATCH: usize = 256;

/// Per-entry transformation applied between the two buffers
pub trait Processor: Send + Sync {
    /// Transform one entry; `None` drops it
    fn process(&self, entry: JournalEntry) -> Option<JournalEntry>;
}

/// Forwards every entry unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl Processor for PassThrough {
    #[inline]
    fn process(&self, entry: JournalEntry) -> Option<JournalEntry> {
        Some(entry)
    }
}

/// Shared state for the process-stage workers
#[derive(Clone)]
pub struct ProcessStage {
    process: Arc<RingBuffer<JournalEntry>>,
    output: Arc<RingBuffer<JournalEntry>>,
    processor: Arc<dyn Processor>,
    acks: Arc<AckTracker>,
    metrics: Arc<PipelineMetrics>,
}

impl std::fmt::Debug for ProcessStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessStage")
            .field("process", &self.process)
            .field("output", &self.output)
            .finish()
    }
}

impl ProcessStage {
    pub(crate) fn new(
        process: Arc<RingBuffer<JournalEntry>>,
        output: Arc<RingBuffer<JournalEntry>>,
        processor: Arc<dyn Processor>,
        acks: Arc<AckTracker>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            process,
            output,
            processor,
            acks,
            metrics,
        }
    }

    /// Run one worker until cancelled
    ///
    /// An entry already taken from the process buffer when cancellation
    /// arrives is left unacknowledged and replayed after restart.
    pub async fn run_worker(self, worker_id: usize, cancel: CancellationToken) {
        debug!(worker_id, "process worker started");

        'outer: loop {
            let batch = self.process.drain_batch(WORKER_BATCH);
            if batch.is_empty() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = self.process.wait_for_items() => continue,
                }
            }

            for entry in batch {
                let offset = entry.offset;
                let Some(mut pending) = self.processor.process(entry) else {
                    self.metrics.record_filtered();
                    self.acks.ack([offset]);
                    continue;
                };

                loop {
                    match self.output.put(pending) {
                        Ok(()) => {
                            self.metrics.record_processed();
                            break;
                        }
                        Err(back) => {
                            pending = back;
                            tokio::select! {
                                _ = cancel.cancelled() => break 'outer,
                                _ = self.output.wait_for_space() => {}
                            }
                        }
                    }
                }
            }

            if cancel.is_cancelled() {
                break;
            }
        }

        debug!(worker_id, "process worker stopped");
    }
}
