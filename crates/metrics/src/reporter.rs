//! Unified metrics reporter
//!
//! Collects metrics from all components and reports them periodically.
//!
//! # Overview
//!
//! The `UnifiedReporter` aggregates metrics from:
//! - Pipeline ingest (accepted, throttled, append errors)
//! - Journal (offsets, segments, size)
//! - Ring buffers (fill level, rejections)
//! - Chunk assembler (completions, expiries, malformed chunks)
//! - Output dispatcher (throughput, latency, failures, drops)
//! - Sources (datagrams received)
//!
//! It runs as an async task, collecting snapshots at the configured interval
//! and outputting formatted metrics via tracing.

use crate::{
    AssemblerMetricsProvider, BufferMetricsProvider, CollectedBuffer, CollectedDispatcher,
    CollectedMetrics, CollectedSource, DispatcherMetricsProvider, HumanFormatter,
    JournalMetricsProvider, JsonFormatter, PipelineSnapshot, SourceMetricsProvider,
    format::MetricsFormatter,
};
use sluice_config::{MetricsConfig, MetricsFormat};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Trait for the pipeline's ingest-side metrics
pub trait PipelineMetricsProvider: Send + Sync {
    /// Get a snapshot of pipeline metrics
    fn pipeline_snapshot(&self) -> PipelineSnapshot;
}

/// Builder for constructing a UnifiedReporter
#[derive(Default)]
pub struct UnifiedReporterBuilder {
    config: Option<MetricsConfig>,
    pipeline: Option<Arc<dyn PipelineMetricsProvider>>,
    journal: Option<Arc<dyn JournalMetricsProvider>>,
    buffers: Vec<Arc<dyn BufferMetricsProvider>>,
    assembler: Option<Arc<dyn AssemblerMetricsProvider>>,
    dispatcher: Option<Arc<dyn DispatcherMetricsProvider>>,
    sources: Vec<Arc<dyn SourceMetricsProvider>>,
}

impl UnifiedReporterBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the metrics configuration
    pub fn config(mut self, config: MetricsConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the pipeline metrics provider
    pub fn pipeline(mut self, provider: Arc<dyn PipelineMetricsProvider>) -> Self {
        self.pipeline = Some(provider);
        self
    }

    /// Set the journal metrics provider
    pub fn journal(mut self, provider: Arc<dyn JournalMetricsProvider>) -> Self {
        self.journal = Some(provider);
        self
    }

    /// Register a ring buffer metrics provider
    pub fn buffer(mut self, provider: Arc<dyn BufferMetricsProvider>) -> Self {
        self.buffers.push(provider);
        self
    }

    /// Set the assembler metrics provider
    pub fn assembler(mut self, provider: Arc<dyn AssemblerMetricsProvider>) -> Self {
        self.assembler = Some(provider);
        self
    }

    /// Set the dispatcher metrics provider
    pub fn dispatcher(mut self, provider: Arc<dyn DispatcherMetricsProvider>) -> Self {
        self.dispatcher = Some(provider);
        self
    }

    /// Register a source metrics provider
    pub fn source(mut self, provider: Arc<dyn SourceMetricsProvider>) -> Self {
        self.sources.push(provider);
        self
    }

    /// Register multiple source metrics providers
    pub fn sources(mut self, providers: Vec<Arc<dyn SourceMetricsProvider>>) -> Self {
        self.sources.extend(providers);
        self
    }

    /// Build the UnifiedReporter
    pub fn build(self) -> UnifiedReporter {
        let config = self.config.unwrap_or_default();
        let formatter: Box<dyn MetricsFormatter> = match config.format {
            MetricsFormat::Human => Box::new(HumanFormatter::new()),
            MetricsFormat::Json => Box::new(JsonFormatter::new()),
        };

        UnifiedReporter {
            config,
            formatter,
            pipeline: self.pipeline,
            journal: self.journal,
            buffers: self.buffers,
            assembler: self.assembler,
            dispatcher: self.dispatcher,
            sources: self.sources,
            previous: None,
        }
    }
}

/// Unified metrics reporter
///
/// Collects and reports metrics from all components at a configured interval.
pub struct UnifiedReporter {
    config: MetricsConfig,
    formatter: Box<dyn MetricsFormatter>,
    pipeline: Option<Arc<dyn PipelineMetricsProvider>>,
    journal: Option<Arc<dyn JournalMetricsProvider>>,
    buffers: Vec<Arc<dyn BufferMetricsProvider>>,
    assembler: Option<Arc<dyn AssemblerMetricsProvider>>,
    dispatcher: Option<Arc<dyn DispatcherMetricsProvider>>,
    sources: Vec<Arc<dyn SourceMetricsProvider>>,
    previous: Option<CollectedMetrics>,
}

impl UnifiedReporter {
    /// Create a new builder
    pub fn builder() -> UnifiedReporterBuilder {
        UnifiedReporterBuilder::new()
    }

    /// Run the reporter until cancellation
    ///
    /// This is the main entry point - spawn this as a tokio task.
    pub async fn run(mut self, cancel: CancellationToken) {
        if !self.config.enabled {
            info!("metrics reporting disabled");
            return;
        }

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            interval_secs = self.config.interval.as_secs(),
            format = ?self.config.format,
            "metrics reporter started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.report();
                }
            }
        }
    }

    /// Collect and report metrics once
    fn report(&mut self) {
        let metrics = self.collect();
        let rates = self.previous.as_ref().and_then(|prev| metrics.rates(prev));

        let output = self.formatter.format_unified(&metrics, rates.as_ref());

        // Log each line separately for human format (multiple lines)
        for line in output.lines() {
            info!("{}", line);
        }

        self.previous = Some(metrics);
    }

    /// Collect metrics from all registered providers
    fn collect(&self) -> CollectedMetrics {
        let mut metrics = CollectedMetrics {
            timestamp: Some(Instant::now()),
            ..Default::default()
        };

        // Ingest counters are always reported
        metrics.pipeline = self.pipeline.as_ref().map(|p| p.pipeline_snapshot());

        if self.config.include_journal {
            metrics.journal = self.journal.as_ref().map(|j| j.snapshot());
        }

        if self.config.include_buffers {
            metrics.buffers = self
                .buffers
                .iter()
                .map(|b| CollectedBuffer {
                    name: b.buffer_name().to_string(),
                    snapshot: b.snapshot(),
                })
                .collect();
        }

        if self.config.include_assembler {
            metrics.assembler = self.assembler.as_ref().map(|a| a.snapshot());
        }

        if self.config.include_dispatcher {
            metrics.dispatcher = self.dispatcher.as_ref().map(|d| CollectedDispatcher {
                sink_type: d.sink_type().to_string(),
                snapshot: d.snapshot(),
            });
        }

        if self.config.include_sources {
            metrics.sources = self
                .sources
                .iter()
                .map(|s| CollectedSource {
                    id: s.source_id().to_string(),
                    source_type: s.source_type().to_string(),
                    snapshot: s.snapshot(),
                })
                .collect();
        }

        metrics
    }

    /// Add a source provider dynamically
    pub fn add_source(&mut self, provider: Arc<dyn SourceMetricsProvider>) {
        self.sources.push(provider);
    }
}
