//! Sluice Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! An empty file is a valid configuration - only specify what you need to change.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use sluice_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[sink]\ntype = \"null\"").unwrap();
//! assert_eq!(config.sink.type_name(), "null");
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [journal]
//! path = "/var/lib/sluice/journal"
//! max_segment_size = 104857600
//!
//! [buffers]
//! process_capacity = 65536
//! output_capacity = 65536
//!
//! [admission]
//! high_water = 95.0
//! low_water = 80.0
//!
//! [dispatcher]
//! batch_size = 500
//! flush_interval = "1s"
//!
//! [sink]
//! type = "file"
//! path = "logs/messages.log"
//!
//! [sources.udp]
//! port = 12201
//! ```

mod assembler;
mod buffers;
mod dispatcher;
mod error;
mod journal;
mod logging;
mod metrics;
mod sinks;
mod sources;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use assembler::AssemblerConfig;
pub use buffers::{AdmissionConfig, BuffersConfig};
pub use dispatcher::{DispatcherConfig, ProcessingConfig};
pub use error::{ConfigError, Result};
pub use journal::{FsyncMode, JournalConfig, RetentionConfig};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use metrics::{MetricsConfig, MetricsFormat};
pub use sinks::{FileSinkConfig, SinkConfig, StdoutSinkConfig};
pub use sources::{SourcesConfig, UdpSourceConfig};

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Metrics reporting configuration
    pub metrics: MetricsConfig,

    /// Commit log journal
    pub journal: JournalConfig,

    /// Ring buffer capacities
    pub buffers: BuffersConfig,

    /// Admission control watermarks
    pub admission: AdmissionConfig,

    /// Chunk reassembly limits
    pub assembler: AssemblerConfig,

    /// Processing stage workers
    pub processing: ProcessingConfig,

    /// Output dispatcher batching and retry policy
    pub dispatcher: DispatcherConfig,

    /// Downstream sink
    pub sink: SinkConfig,

    /// Network sources
    pub sources: SourcesConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, contains invalid TOML, or
    /// fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Parse and validate configuration from a TOML string
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Whether the UDP source should be started
    pub fn udp_enabled(&self) -> bool {
        self.sources.udp.as_ref().is_some_and(|udp| udp.enabled)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_example_config_parses() {
        let config = Config::from_str(include_str!("../../../configs/sluice.toml")).unwrap();
        assert!(config.udp_enabled());
        assert_eq!(config.sink.type_name(), "file");
        assert_eq!(config.processing.workers, 2);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.buffers.process_capacity, 65536);
        assert_eq!(config.sink.type_name(), "stdout");
        assert!(!config.udp_enabled());
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[log]
level = "debug"

[metrics]
interval = "5s"

[journal]
path = "/tmp/sluice/journal"
max_segment_size = 4096
fsync = "every_append"

[journal.retention]
max_age = "1h"

[buffers]
process_capacity = 1024
output_capacity = 512

[admission]
high_water = 90.0
low_water = 70.0

[assembler]
ttl = "3s"

[processing]
workers = 2

[dispatcher]
batch_size = 100
max_retries = 5

[sink]
type = "file"
path = "logs/out.log"

[sources.udp]
port = 12201
num_workers = 2
"#;
        let config = Config::from_str(toml).unwrap();

        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.metrics.interval, Duration::from_secs(5));
        assert_eq!(config.journal.max_segment_size, 4096);
        assert_eq!(config.journal.fsync, FsyncMode::EveryAppend);
        assert_eq!(config.journal.retention.max_age, Duration::from_secs(3600));
        assert_eq!(config.buffers.output_capacity, 512);
        assert_eq!(config.admission.low_water, 70.0);
        assert_eq!(config.assembler.ttl, Duration::from_secs(3));
        assert_eq!(config.processing.workers, 2);
        assert_eq!(config.dispatcher.max_retries, 5);
        assert_eq!(config.sink.type_name(), "file");
        assert!(config.udp_enabled());
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_str("invalid { toml");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[buffers]\noutput_capacity = 64").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.buffers.output_capacity, 64);
    }

    #[test]
    fn test_from_missing_file() {
        let err = Config::from_file("/nonexistent/sluice.toml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError { .. }));
    }
}
