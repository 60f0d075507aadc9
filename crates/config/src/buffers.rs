//! Ring buffer and admission configuration

use serde::Deserialize;

/// Capacities of the two in-memory ring buffers
///
/// ```toml
/// [buffers]
/// process_capacity = 65536
/// output_capacity = 65536
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuffersConfig {
    /// Slots in the journal → process buffer
    pub process_capacity: usize,

    /// Slots in the process → output buffer
    pub output_capacity: usize,
}

impl Default for BuffersConfig {
    fn default() -> Self {
        Self {
            process_capacity: 65536,
            output_capacity: 65536,
        }
    }
}

/// Hysteresis band for admission control
///
/// Input is throttled once the process buffer fills past `high_water`
/// percent and admitted again only after it drains below `low_water`.
///
/// ```toml
/// [admission]
/// high_water = 95.0
/// low_water = 80.0
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Utilization percent that starts throttling
    pub high_water: f64,

    /// Utilization percent that resumes admission
    pub low_water: f64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            high_water: 95.0,
            low_water: 80.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let buffers = BuffersConfig::default();
        assert_eq!(buffers.process_capacity, 65536);
        assert_eq!(buffers.output_capacity, 65536);

        let admission = AdmissionConfig::default();
        assert_eq!(admission.high_water, 95.0);
        assert_eq!(admission.low_water, 80.0);
    }

    #[test]
    fn test_deserialize_partial() {
        let buffers: BuffersConfig = toml::from_str("output_capacity = 128").unwrap();
        assert_eq!(buffers.process_capacity, 65536);
        assert_eq!(buffers.output_capacity, 128);
    }
}
