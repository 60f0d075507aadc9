//! Pipeline assembly
//!
//! [`Pipeline`] owns every stage and the state they share. It is built
//! once by the process entry point; upstream sources receive an
//! [`Ingestor`] clone and the reporter receives metrics handles.

use std::sync::Arc;
use std::time::Duration;

use sluice_assembler::{AssemblerMetricsHandle, ChunkAssembler};
use sluice_buffer::{AdmissionGate, BufferMetricsHandle, RingBuffer};
use sluice_config::Config;
use sluice_journal::{CommitLogJournal, JournalEntry, JournalMetricsHandle};
use sluice_sinks::{Sink, SinkKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ack::AckTracker;
use crate::blocking::with_journal;
use crate::dispatcher::{DispatcherMetricsHandle, OutputDispatcher};
use crate::error::{PipelineError, Result};
use crate::ingest::Ingestor;
use crate::metrics::{PipelineMetrics, PipelineMetricsHandle};
use crate::process::{PassThrough, ProcessStage, Processor};
use crate::reader::JournalReader;

/// The assembled ingest-to-sink pipeline
pub struct Pipeline {
    config: Config,
    journal: Arc<CommitLogJournal>,
    process: Arc<RingBuffer<JournalEntry>>,
    output: Arc<RingBuffer<JournalEntry>>,
    gate: Arc<AdmissionGate>,
    assembler: Arc<ChunkAssembler>,
    acks: Arc<AckTracker>,
    processor: Arc<dyn Processor>,
    metrics: Arc<PipelineMetrics>,
    dispatcher: OutputDispatcher,
    reader_poll_interval: Option<Duration>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("journal", &self.journal)
            .field("process", &self.process)
            .field("output", &self.output)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl Pipeline {
    /// Build the pipeline with the sink named in `config.sink`
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be opened or the sink cannot
    /// be initialized.
    pub fn new(config: &Config) -> Result<Self> {
        let sink = SinkKind::from_config(&config.sink)?;
        Self::with_sink(config, Arc::new(sink))
    }

    /// Build the pipeline around an existing sink
    pub fn with_sink(config: &Config, sink: Arc<dyn Sink>) -> Result<Self> {
        let journal = Arc::new(CommitLogJournal::open(&config.journal)?);
        let process = Arc::new(RingBuffer::new("process", config.buffers.process_capacity));
        let output = Arc::new(RingBuffer::new("output", config.buffers.output_capacity));
        let gate = Arc::new(AdmissionGate::new(
            process.watermark(),
            config.admission.high_water,
            config.admission.low_water,
        ));
        let assembler = Arc::new(ChunkAssembler::new(config.assembler.clone()));
        let acks = Arc::new(AckTracker::new(Arc::clone(&journal)));
        let dispatcher = OutputDispatcher::new(
            Arc::clone(&output),
            sink,
            Arc::clone(&acks),
            config.dispatcher.clone(),
        );

        info!(
            journal = %journal.dir().display(),
            log_end_offset = journal.log_end_offset(),
            committed = ?journal.committed_read_offset(),
            process_capacity = process.capacity(),
            output_capacity = output.capacity(),
            sink = config.sink.type_name(),
            "pipeline built"
        );

        Ok(Self {
            config: config.clone(),
            journal,
            process,
            output,
            gate,
            assembler,
            acks,
            processor: Arc::new(PassThrough),
            metrics: Arc::new(PipelineMetrics::new()),
            dispatcher,
            reader_poll_interval: None,
        })
    }

    /// Replace the pass-through processor
    pub fn with_processor(mut self, processor: Arc<dyn Processor>) -> Self {
        self.processor = processor;
        self
    }

    /// Override how often the reader polls when no append wakes it
    pub fn with_reader_poll_interval(mut self, interval: Duration) -> Self {
        self.reader_poll_interval = Some(interval);
        self
    }

    /// Entry point for sources
    pub fn ingestor(&self) -> Ingestor {
        Ingestor::new(
            Arc::clone(&self.journal),
            Arc::clone(&self.gate),
            Arc::clone(&self.assembler),
            Arc::clone(&self.metrics),
        )
    }

    /// The journal backing this pipeline
    pub fn journal(&self) -> &Arc<CommitLogJournal> {
        &self.journal
    }

    /// Start every loop; they stop when `cancel` fires
    pub fn spawn(self, cancel: CancellationToken) -> PipelineTasks {
        let mut tasks = Vec::new();

        let mut reader = JournalReader::new(
            Arc::clone(&self.journal),
            Arc::clone(&self.process),
            Arc::clone(&self.acks),
            Arc::clone(&self.metrics),
        );
        if let Some(interval) = self.reader_poll_interval {
            reader = reader.with_poll_interval(interval);
        }
        tasks.push(("journal-reader", tokio::spawn(reader.run(cancel.clone()))));

        let stage = ProcessStage::new(
            Arc::clone(&self.process),
            Arc::clone(&self.output),
            Arc::clone(&self.processor),
            Arc::clone(&self.acks),
            Arc::clone(&self.metrics),
        );
        let workers = self.config.processing.workers.max(1);
        for worker_id in 0..workers {
            tasks.push((
                "process-worker",
                tokio::spawn(stage.clone().run_worker(worker_id, cancel.clone())),
            ));
        }

        tasks.push((
            "output-dispatcher",
            tokio::spawn(self.dispatcher.run(cancel.clone())),
        ));
        tasks.push((
            "assembler-sweeper",
            tokio::spawn(Arc::clone(&self.assembler).run_sweeper(cancel.clone())),
        ));
        tasks.push((
            "journal-maintenance",
            tokio::spawn(run_journal_maintenance(
                Arc::clone(&self.journal),
                self.config.journal.flush_interval,
                self.config.journal.cleanup_interval,
                cancel,
            )),
        ));

        info!(process_workers = workers, "pipeline started");

        PipelineTasks {
            journal: self.journal,
            tasks,
        }
    }

    // ------------------------------------------------------------------------
    // Metrics handles
    // ------------------------------------------------------------------------

    /// Ingest and processing counters
    pub fn pipeline_metrics(&self) -> PipelineMetricsHandle {
        PipelineMetricsHandle::new(Arc::clone(&self.metrics), Arc::clone(&self.gate))
    }

    /// Journal size, segments and offsets
    pub fn journal_metrics(&self) -> JournalMetricsHandle {
        self.journal.metrics_handle()
    }

    /// Journal -> process buffer fill level
    pub fn process_buffer_metrics(&self) -> BufferMetricsHandle {
        self.process.metrics_handle()
    }

    /// Process -> output buffer fill level
    pub fn output_buffer_metrics(&self) -> BufferMetricsHandle {
        self.output.metrics_handle()
    }

    /// Chunk reassembly counters
    pub fn assembler_metrics(&self) -> AssemblerMetricsHandle {
        self.assembler.metrics_handle()
    }

    /// Sink write counters
    pub fn dispatcher_metrics(&self) -> DispatcherMetricsHandle {
        self.dispatcher.metrics_handle()
    }
}

/// Periodic journal flush and retention cleanup
async fn run_journal_maintenance(
    journal: Arc<CommitLogJournal>,
    flush_interval: Duration,
    cleanup_interval: Duration,
    cancel: CancellationToken,
) {
    let mut flush_ticker = tokio::time::interval(flush_interval);
    flush_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut cleanup_ticker = tokio::time::interval(cleanup_interval);
    cleanup_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = flush_ticker.tick() => {
                if let Err(e) = with_journal("journal-flush", &journal, |j| j.flush()).await {
                    warn!(error = %e, "journal flush failed");
                }
            }
            _ = cleanup_ticker.tick() => {
                match with_journal("journal-cleanup", &journal, |j| Ok(j.cleanup())).await {
                    Ok(0) => {}
                    Ok(removed) => {
                        debug!(removed, segments = journal.number_of_segments(), "journal cleanup");
                    }
                    Err(e) => warn!(error = %e, "journal cleanup failed"),
                }
            }
        }
    }

    debug!("journal maintenance stopped");
}

/// Handles for the running pipeline loops
#[derive(Debug)]
pub struct PipelineTasks {
    journal: Arc<CommitLogJournal>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl PipelineTasks {
    /// Number of spawned loops
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no loops were spawned
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every loop to stop, then flush and close the journal
    ///
    /// The journal is closed even if a loop failed; the first failure is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Task` if a loop panicked and
    /// `PipelineError::Journal` if the final flush or close failed.
    pub async fn join(self) -> Result<()> {
        let mut first_error = None;

        for (name, handle) in self.tasks {
            if let Err(e) = handle.await {
                warn!(task = name, error = %e, "pipeline task failed");
                first_error.get_or_insert(PipelineError::Task {
                    name,
                    reason: e.to_string(),
                });
            }
        }

        let closed = with_journal("journal-close", &self.journal, |j| j.close()).await;
        info!(
            log_end_offset = self.journal.log_end_offset(),
            committed = ?self.journal.committed_read_offset(),
            "pipeline stopped"
        );

        match first_error {
            Some(e) => Err(e),
            None => closed,
        }
    }
}
