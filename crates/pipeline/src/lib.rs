//! Sluice - Pipeline
//!
//! The stages between an accepted message and the sink.
//!
//! # Architecture
//!
//! ```text
//! [Sources] ──ingest/on_chunk──→ [Ingestor] ──append──→ [CommitLogJournal]
//!                                   │ AdmissionGate             │
//!                                   │ (process watermark)       │ read
//!                                   ▼                           ▼
//!                               [Throttled]              [JournalReader]
//!                                                               │ put
//!                                                               ▼
//!                 [Sink] ←──write── [OutputDispatcher] ←── [output] ←── [ProcessStage] ←── [process]
//!                                          │
//!                                          └──ack──→ [AckTracker] ──commit──→ journal
//! ```
//!
//! # Key Design
//!
//! - **Durable first**: a message is acknowledged to the source only after
//!   it is in the journal; everything downstream replays from there
//! - **Explicit backpressure**: `IngestOutcome::Throttled`, never an error
//! - **Fail-fast buffers**: loops park on async notifications, not locks
//! - **At-least-once**: the committed offset only covers acknowledged
//!   offsets and is persisted on flush
//!
//! # Example
//!
//! ```ignore
//! use sluice_pipeline::Pipeline;
//! use tokio_util::sync::CancellationToken;
//!
//! let pipeline = Pipeline::new(&config)?;
//! let ingestor = pipeline.ingestor();
//! let cancel = CancellationToken::new();
//! let tasks = pipeline.spawn(cancel.clone());
//!
//! ingestor.ingest(b"{\"short_message\":\"hello\"}")?;
//!
//! cancel.cancel();
//! tasks.join().await?;
//! ```

mod ack;
mod blocking;
mod dispatcher;
mod error;
mod ingest;
mod metrics;
mod pipeline;
mod process;
mod reader;

pub use ack::AckTracker;
pub use dispatcher::{Delivery, DispatcherMetricsHandle, OutputDispatcher};
pub use error::{PipelineError, Result};
pub use ingest::{IngestOutcome, Ingestor};
pub use metrics::{PipelineMetrics, PipelineMetricsHandle, ThrottleTracker};
pub use pipeline::{Pipeline, PipelineTasks};
pub use process::{PassThrough, ProcessStage, Processor};
pub use reader::{DEFAULT_POLL_INTERVAL, DEFAULT_READ_BATCH, JournalReader};
