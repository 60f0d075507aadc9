//! Admission control
//!
//! Hysteresis gate in front of the journal. Once the watched buffer climbs
//! above the high-water mark new input is refused until the buffer drains
//! below the low-water mark, so the gate does not flap around one level.

use std::sync::atomic::{AtomicBool, Ordering};

use sluice_metrics::Counter;
use tracing::{info, warn};

use crate::watermark::Watermark;

/// Hysteresis switch driven by a buffer watermark
#[derive(Debug)]
pub struct AdmissionGate {
    watermark: Watermark,
    high_water: f64,
    low_water: f64,
    throttled: AtomicBool,
    /// Number of times the gate closed
    closed_count: Counter,
}

impl AdmissionGate {
    /// Create a gate over `watermark` with percentage thresholds
    pub fn new(watermark: Watermark, high_water: f64, low_water: f64) -> Self {
        Self {
            watermark,
            high_water,
            low_water,
            throttled: AtomicBool::new(false),
            closed_count: Counter::new(),
        }
    }

    /// Decide whether the next message may enter
    ///
    /// Closes when utilization exceeds the high-water mark and reopens
    /// only once it drops below the low-water mark.
    pub fn admit(&self) -> bool {
        let utilization = self.watermark.utilization_percent();

        if self.throttled.load(Ordering::Acquire) {
            if utilization >= self.low_water {
                return false;
            }
            if self
                .throttled
                .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                info!(
                    utilization = format!("{:.1}", utilization),
                    low_water = self.low_water,
                    "admission resumed"
                );
            }
            return true;
        }

        if utilization > self.high_water {
            if self
                .throttled
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.closed_count.inc();
                warn!(
                    utilization = format!("{:.1}", utilization),
                    high_water = self.high_water,
                    "admission throttled: process buffer above high-water mark"
                );
            }
            return false;
        }

        true
    }

    /// Whether the gate is currently refusing input
    #[inline]
    pub fn is_throttled(&self) -> bool {
        self.throttled.load(Ordering::Acquire)
    }

    /// Number of times the gate has closed
    pub fn closed_count(&self) -> u64 {
        self.closed_count.get()
    }

    /// Watermark this gate watches
    pub fn watermark(&self) -> &Watermark {
        &self.watermark
    }
}
