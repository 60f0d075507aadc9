//! Human-readable metrics formatter
//!
//! Formats metrics in a compact, readable format for operators.
//!
//! # Example Output
//!
//! ```text
//! [metrics] ingest: 12.0K/s | 4.5 MB/s | throttled: 0
//! [metrics] journal: end 1.2M | committed 1.2M | lag 120 | 3 segments, 410.2 MB
//! [metrics] buffers: process 12.5% (8.2K/65.5K) | output 0.4% (262/65.5K)
//! [metrics] assembler: 300/s chunks | 100/s done | 2 pending | 0 expired
//! [metrics] dispatch: stdout (12.0K/s, 1.20ms avg, ok)
//! [metrics] sources: udp (4.0K/s, 1.2 MB/s)
//! ```

use super::MetricsFormatter;
use super::units;
use crate::{CollectedMetrics, MetricsRates};
use std::fmt::Write;

/// Human-readable metrics formatter
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter;

impl HumanFormatter {
    /// Create a new human formatter
    pub fn new() -> Self {
        Self
    }

    fn format_pipeline(&self, rates: &MetricsRates) -> Option<String> {
        let pipeline = rates.pipeline.as_ref()?;

        let mut output = format!(
            "[metrics] ingest: {} | {} | throttled: {}",
            units::rate(pipeline.messages_per_sec),
            units::bytes_rate(pipeline.bytes_per_sec),
            pipeline.throttled,
        );
        if pipeline.throttle_active {
            output.push_str(" (gate closed)");
        }
        if pipeline.append_errors > 0 {
            let _ = write!(output, " | {} append err", pipeline.append_errors);
        }
        Some(output)
    }

    fn format_journal(&self, metrics: &CollectedMetrics) -> Option<String> {
        let journal = metrics.journal.as_ref()?;

        Some(format!(
            "[metrics] journal: end {} | committed {} | lag {} | {} segments, {}",
            units::count(journal.log_end_offset),
            units::offset(journal.committed_offset),
            units::count(journal.uncommitted()),
            journal.segments,
            units::bytes(journal.size_bytes),
        ))
    }

    fn format_buffers(&self, metrics: &CollectedMetrics) -> Option<String> {
        if metrics.buffers.is_empty() {
            return None;
        }

        let mut output = String::from("[metrics] buffers:");

        for (i, buffer) in metrics.buffers.iter().enumerate() {
            if i > 0 {
                output.push_str(" |");
            }

            let _ = write!(
                output,
                " {} {}",
                buffer.name,
                units::fill(
                    buffer.snapshot.utilization_percent,
                    buffer.snapshot.len,
                    buffer.snapshot.capacity,
                ),
            );

            if buffer.snapshot.rejected > 0 {
                let _ = write!(output, ", {} rejected", buffer.snapshot.rejected);
            }
        }

        Some(output)
    }

    fn format_assembler(&self, rates: &MetricsRates) -> Option<String> {
        let assembler = rates.assembler.as_ref()?;

        let mut output = format!(
            "[metrics] assembler: {} chunks | {} done | {} pending | {} expired",
            units::rate(assembler.chunks_per_sec),
            units::rate(assembler.completed_per_sec),
            assembler.pending_sets,
            assembler.expired,
        );
        if assembler.malformed > 0 {
            let _ = write!(output, " | {} malformed", assembler.malformed);
        }
        Some(output)
    }

    fn format_dispatcher(&self, rates: &MetricsRates) -> Option<String> {
        let dispatcher = rates.dispatcher.as_ref()?;

        let mut output = format!(
            "[metrics] dispatch: {} ({}, {} avg",
            dispatcher.sink_type,
            units::rate(dispatcher.messages_per_sec),
            units::millis(dispatcher.avg_latency),
        );

        if dispatcher.failures > 0 || dispatcher.dropped > 0 {
            let _ = write!(
                output,
                ", {} err, {} dropped",
                dispatcher.failures, dispatcher.dropped
            );
        } else {
            output.push_str(", ok");
        }

        output.push(')');
        Some(output)
    }

    fn format_sources(&self, rates: &MetricsRates) -> Option<String> {
        if rates.sources.is_empty() {
            return None;
        }

        let mut output = String::from("[metrics] sources:");

        for (i, source) in rates.sources.iter().enumerate() {
            if i > 0 {
                output.push_str(" |");
            }

            let _ = write!(
                output,
                " {} ({}, {}",
                source.id,
                units::rate(source.packets_per_sec),
                units::bytes_rate(source.bytes_per_sec),
            );

            if source.malformed > 0 {
                let _ = write!(output, ", {} malformed", source.malformed);
            }
            if source.errors > 0 {
                let _ = write!(output, ", {} err", source.errors);
            }

            output.push(')');
        }

        Some(output)
    }
}

impl MetricsFormatter for HumanFormatter {
    fn format_unified(&self, metrics: &CollectedMetrics, rates: Option<&MetricsRates>) -> String {
        let Some(rates) = rates else {
            return "[metrics] collecting baseline...".to_string();
        };

        let lines: Vec<String> = [
            self.format_pipeline(rates),
            self.format_journal(metrics),
            self.format_buffers(metrics),
            self.format_assembler(rates),
            self.format_dispatcher(rates),
            self.format_sources(rates),
        ]
        .into_iter()
        .flatten()
        .collect();

        if lines.is_empty() {
            "[metrics] no activity".to_string()
        } else {
            lines.join("\n")
        }
    }
}
