//! Sluice - Metrics
//!
//! Internal metrics collection and reporting for observability.
//!
//! # Overview
//!
//! This crate provides:
//! - Atomic metric counters for the assembler, dispatcher and sources
//! - Snapshot types and provider traits for the journal and ring buffers
//! - Unified reporter with configurable output formats (human, JSON)
//!
//! # Metrics Handle Pattern
//!
//! Components use `Arc<Metrics>` internally and provide a `metrics_handle()` method
//! that returns a lightweight handle implementing the appropriate provider trait.
//! The handle remains valid after `run()` consumes the component.
//!
//! ```text
//! Component (owns Arc<Metrics>)
//!     │
//!     ├──► metrics_handle() → Handle (clones Arc, implements Provider trait)
//!     │
//!     └──► run() [consumes self, Arc keeps metrics alive]
//!
//! Sluice wiring:
//!     1. Build the pipeline and sources
//!     2. Collect their metrics handles
//!     3. Spawn the pipeline and sources
//!     4. Build UnifiedReporter with collected handles
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sluice_metrics::UnifiedReporter;
//!
//! let reporter = UnifiedReporter::builder()
//!     .config(config.metrics.clone())
//!     .journal(pipeline.journal_metrics())
//!     .buffer(pipeline.process_buffer_metrics())
//!     .build();
//! tokio::spawn(reporter.run(cancel.clone()));
//! ```

mod collected;
pub mod format;
mod reporter;
mod traits;

pub use collected::{
    AssemblerRates, CollectedBuffer, CollectedDispatcher, CollectedMetrics, CollectedSource,
    DispatcherRates, JournalRates, MetricsRates, PipelineRates, PipelineSnapshot, SourceRates,
};
pub use format::{HumanFormatter, JsonFormatter, MetricsFormatter};
pub use reporter::{PipelineMetricsProvider, UnifiedReporter, UnifiedReporterBuilder};
pub use traits::{
    AssemblerMetrics, AssemblerMetricsProvider, AssemblerMetricsSnapshot, BufferMetricsProvider,
    BufferMetricsSnapshot, DispatcherMetrics, DispatcherMetricsProvider,
    DispatcherMetricsSnapshot, JournalMetricsProvider, JournalMetricsSnapshot, SourceMetrics,
    SourceMetricsProvider, SourceMetricsSnapshot,
};

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter wrapper for convenient metric operations
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Create a new counter initialized to 0
    #[inline]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increment the counter by `val` (relaxed ordering for performance)
    #[inline]
    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    /// Increment the counter by 1
    #[inline]
    pub fn inc(&self) {
        self.add(1);
    }

    /// Get the current value (relaxed ordering)
    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}
