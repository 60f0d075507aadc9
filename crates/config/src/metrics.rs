//! Metrics reporting configuration
//!
//! Metrics are enabled by default and logged through `tracing` at the
//! configured interval. Each pipeline stage can be left out of the report.

use serde::Deserialize;
use std::time::Duration;

/// Metrics output format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetricsFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// JSON structured output
    Json,
}

/// Metrics configuration
///
/// # Example
///
/// ```toml
/// [metrics]
/// enabled = true
/// interval = "30s"
/// format = "json"
/// include_assembler = false
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics reporting
    pub enabled: bool,

    /// Reporting interval
    /// Default: 60s
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Output format (human, json)
    pub format: MetricsFormat,

    /// Include journal metrics (size, segments, offsets)
    pub include_journal: bool,

    /// Include ring buffer watermarks
    pub include_buffers: bool,

    /// Include chunk assembler counters
    pub include_assembler: bool,

    /// Include dispatcher metrics (writes, latency, drops)
    pub include_dispatcher: bool,

    /// Include source metrics (packets, bytes, rejections)
    pub include_sources: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60),
            format: MetricsFormat::Human,
            include_journal: true,
            include_buffers: true,
            include_assembler: true,
            include_dispatcher: true,
            include_sources: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.format, MetricsFormat::Human);
        assert!(config.include_journal);
        assert!(config.include_buffers);
        assert!(config.include_dispatcher);
    }

    #[test]
    fn test_deserialize_empty() {
        let config: MetricsConfig = toml::from_str("").unwrap();
        assert!(config.enabled);
        assert_eq!(config.interval, Duration::from_secs(60));
    }

    #[test]
    fn test_deserialize_interval_and_flags() {
        let toml = r#"
interval = "5s"
format = "json"
include_assembler = false
"#;
        let config: MetricsConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.format, MetricsFormat::Json);
        assert!(!config.include_assembler);
        assert!(config.include_sources);
    }
}
