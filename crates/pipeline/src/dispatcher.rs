//! Output dispatcher
//!
//! Drains the output buffer in batches and writes each batch to the sink.
//! A failed write is retried with exponential backoff; once the retry
//! budget is spent the batch is dropped, counted and logged. Either way
//! the batch's offsets are acknowledged so the journal commit can advance.
//!
//! # Scheduling
//!
//! ```text
//! loop {
//!     select! {
//!         cancel           => final drain, break
//!         tick             => drain everything, partial batches included
//!         len >= batch     => deliver one full batch
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use sluice_buffer::RingBuffer;
use sluice_config::DispatcherConfig;
use sluice_journal::JournalEntry;
use sluice_metrics::{DispatcherMetrics, DispatcherMetricsProvider, DispatcherMetricsSnapshot};
use sluice_sinks::{RateLimitedLogger, Sink};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ack::AckTracker;

/// What happened to one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The sink accepted the batch after `attempts` writes
    Delivered { attempts: u32 },
    /// Every attempt failed; the batch was dropped
    Dropped { attempts: u32 },
    /// Cancelled between attempts; the batch stays unacknowledged
    Aborted,
}

/// Writes output-buffer batches to the sink
pub struct OutputDispatcher {
    output: Arc<RingBuffer<JournalEntry>>,
    sink: Arc<dyn Sink>,
    acks: Arc<AckTracker>,
    config: DispatcherConfig,
    metrics: Arc<DispatcherMetrics>,
    error_logger: RateLimitedLogger,
}

impl std::fmt::Debug for OutputDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputDispatcher")
            .field("sink", &self.sink.name())
            .field("output", &self.output)
            .field("batch_size", &self.config.batch_size)
            .finish()
    }
}

impl OutputDispatcher {
    /// Create a dispatcher draining `output` into `sink`
    pub fn new(
        output: Arc<RingBuffer<JournalEntry>>,
        sink: Arc<dyn Sink>,
        acks: Arc<AckTracker>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            output,
            sink,
            acks,
            config,
            metrics: Arc::new(DispatcherMetrics::new()),
            error_logger: RateLimitedLogger::default(),
        }
    }

    /// Deliver at most one batch
    ///
    /// Returns `None` when the output buffer was empty.
    pub async fn run_once(&self, cancel: &CancellationToken) -> Option<Delivery> {
        let batch = self.output.drain_batch(self.config.batch_size.max(1));
        if batch.is_empty() {
            return None;
        }
        Some(self.deliver(batch, cancel).await)
    }

    /// Deliver batches until the output buffer is empty
    pub async fn flush_pending(&self, cancel: &CancellationToken) -> usize {
        let mut batches = 0;
        while let Some(delivery) = self.run_once(cancel).await {
            batches += 1;
            if delivery == Delivery::Aborted {
                break;
            }
        }
        batches
    }

    async fn deliver(&self, batch: Vec<JournalEntry>, cancel: &CancellationToken) -> Delivery {
        let messages = batch.len() as u64;
        let sink_name = self.sink.name();
        let mut backoff = self.config.initial_backoff;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let start = Instant::now();
            match self.sink.write(&batch).await {
                Ok(()) => {
                    self.metrics.record_written(messages, start.elapsed());
                    if attempts > 1 {
                        debug!(sink = sink_name, attempts, "batch delivered after retry");
                    }
                    self.ack(&batch);
                    return Delivery::Delivered { attempts };
                }
                Err(e) => {
                    self.metrics.record_failure();
                    self.error_logger.error(sink_name, "sink write failed", &e);
                }
            }

            if attempts > self.config.max_retries {
                self.metrics.record_dropped(messages);
                warn!(
                    sink = sink_name,
                    attempts,
                    messages,
                    first_offset = batch.first().map(|e| e.offset),
                    last_offset = batch.last().map(|e| e.offset),
                    "dropping batch after exhausting retries"
                );
                self.ack(&batch);
                return Delivery::Dropped { attempts };
            }

            self.metrics.record_retry();
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(sink = sink_name, messages, "retry abandoned on shutdown");
                    return Delivery::Aborted;
                }
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = next_backoff(backoff, self.config.max_backoff);
        }
    }

    fn ack(&self, batch: &[JournalEntry]) {
        self.acks.ack(batch.iter().map(|e| e.offset));
    }

    /// Dispatch until cancelled, then drain what is left
    ///
    /// On shutdown each remaining batch gets a single attempt; batches that
    /// fail then stay unacknowledged and are replayed on the next start.
    pub async fn run(self, cancel: CancellationToken) {
        let batch_size = self.config.batch_size.max(1);
        let mut ticker = tokio::time::interval(self.config.flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            sink = self.sink.name(),
            batch_size,
            flush_interval = ?self.config.flush_interval,
            "output dispatcher started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.flush_pending(&cancel).await;
                }
                _ = self.output.wait_for_len(batch_size) => {
                    self.run_once(&cancel).await;
                }
            }
        }

        let remaining = self.output.len();
        if remaining > 0 {
            info!(remaining, "draining output buffer");
            self.flush_pending(&cancel).await;
        }
        if let Err(e) = self.sink.flush().await {
            warn!(sink = self.sink.name(), error = %e, "sink flush failed on shutdown");
        }

        let snapshot = self.metrics.snapshot();
        info!(
            sink = self.sink.name(),
            batches_written = snapshot.batches_written,
            messages_written = snapshot.messages_written,
            batches_dropped = snapshot.batches_dropped,
            "output dispatcher stopped"
        );
    }

    /// Get a metrics handle for the reporter
    pub fn metrics_handle(&self) -> DispatcherMetricsHandle {
        DispatcherMetricsHandle {
            sink_type: self.sink.name(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Double `current`, capped at `max`
fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

/// Handle for reading dispatcher metrics
#[derive(Debug, Clone)]
pub struct DispatcherMetricsHandle {
    sink_type: &'static str,
    metrics: Arc<DispatcherMetrics>,
}

impl DispatcherMetricsProvider for DispatcherMetricsHandle {
    fn sink_type(&self) -> &str {
        self.sink_type
    }

    fn snapshot(&self) -> DispatcherMetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
#[path = "dispatcher_test.rs"]
mod dispatcher_test;
