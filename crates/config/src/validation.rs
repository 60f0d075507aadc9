//! Configuration validation
//!
//! Rejects values the pipeline cannot run with:
//! - Zero capacities, batch sizes, segment sizes or worker counts
//! - Zero periods for the timer-driven loops
//! - Watermarks the admission gate could never cross
//! - Admission watermarks outside 0..=100 or not forming a band
//! - Chunk limits outside the GELF range
//! - File sinks without a path

use std::time::Duration;

use crate::Config;
use crate::error::{ConfigError, Result};
use crate::sinks::SinkConfig;

/// Highest chunk count a chunked datagram can announce
const MAX_CHUNKS_LIMIT: u8 = 128;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_journal(config)?;
    validate_buffers(config)?;
    validate_admission(config)?;
    validate_assembler(config)?;
    validate_dispatcher(config)?;
    validate_sink(config)?;
    validate_sources(config)?;
    validate_metrics(config)?;
    Ok(())
}

/// Timer periods must be non-zero; a zero tick panics the loop using it
fn require_period(section: &'static str, field: &'static str, period: Duration) -> Result<()> {
    if period.is_zero() {
        return Err(ConfigError::invalid_value(
            section,
            field,
            "must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_journal(config: &Config) -> Result<()> {
    if config.journal.path.as_os_str().is_empty() {
        return Err(ConfigError::missing_field("journal", "path"));
    }
    if config.journal.max_segment_size == 0 {
        return Err(ConfigError::invalid_value(
            "journal",
            "max_segment_size",
            "must be greater than 0",
        ));
    }
    if let crate::FsyncMode::EveryN(0) = config.journal.fsync {
        return Err(ConfigError::invalid_value(
            "journal",
            "fsync",
            "every_n must be greater than 0",
        ));
    }
    require_period("journal", "flush_interval", config.journal.flush_interval)?;
    require_period("journal", "cleanup_interval", config.journal.cleanup_interval)?;
    Ok(())
}

fn validate_buffers(config: &Config) -> Result<()> {
    if config.buffers.process_capacity == 0 {
        return Err(ConfigError::invalid_value(
            "buffers",
            "process_capacity",
            "must be greater than 0",
        ));
    }
    if config.buffers.output_capacity == 0 {
        return Err(ConfigError::invalid_value(
            "buffers",
            "output_capacity",
            "must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_admission(config: &Config) -> Result<()> {
    let admission = &config.admission;
    for (field, value) in [
        ("high_water", admission.high_water),
        ("low_water", admission.low_water),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return Err(ConfigError::invalid_value(
                "admission",
                field,
                format!("{} is not a percentage", value),
            ));
        }
    }
    // The gate closes strictly above high_water and reopens strictly below
    // low_water, so either bound at the edge of the range sticks the gate
    if admission.high_water >= 100.0 {
        return Err(ConfigError::invalid_value(
            "admission",
            "high_water",
            "must be below 100 or the gate can never close",
        ));
    }
    if admission.low_water <= 0.0 {
        return Err(ConfigError::invalid_value(
            "admission",
            "low_water",
            "must be above 0 or the gate can never reopen",
        ));
    }
    if admission.low_water >= admission.high_water {
        return Err(ConfigError::InvertedWatermarks {
            low: admission.low_water,
            high: admission.high_water,
        });
    }
    Ok(())
}

fn validate_assembler(config: &Config) -> Result<()> {
    let assembler = &config.assembler;
    if assembler.max_chunks == 0 || assembler.max_chunks > MAX_CHUNKS_LIMIT {
        return Err(ConfigError::invalid_value(
            "assembler",
            "max_chunks",
            format!("must be between 1 and {}", MAX_CHUNKS_LIMIT),
        ));
    }
    if assembler.ttl.is_zero() {
        return Err(ConfigError::invalid_value(
            "assembler",
            "ttl",
            "must be greater than 0",
        ));
    }
    require_period("assembler", "sweep_interval", assembler.sweep_interval)?;
    if assembler.max_pending == 0 {
        return Err(ConfigError::invalid_value(
            "assembler",
            "max_pending",
            "must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_dispatcher(config: &Config) -> Result<()> {
    if config.dispatcher.batch_size == 0 {
        return Err(ConfigError::invalid_value(
            "dispatcher",
            "batch_size",
            "must be greater than 0",
        ));
    }
    require_period("dispatcher", "flush_interval", config.dispatcher.flush_interval)?;
    if config.processing.workers == 0 {
        return Err(ConfigError::invalid_value(
            "processing",
            "workers",
            "must be greater than 0",
        ));
    }
    if config.dispatcher.initial_backoff > config.dispatcher.max_backoff {
        return Err(ConfigError::invalid_value(
            "dispatcher",
            "initial_backoff",
            "must not exceed max_backoff",
        ));
    }
    Ok(())
}

fn validate_sink(config: &Config) -> Result<()> {
    if let SinkConfig::File(file) = &config.sink
        && file.path.as_os_str().is_empty()
    {
        return Err(ConfigError::missing_field("sink", "path"));
    }
    Ok(())
}

fn validate_sources(config: &Config) -> Result<()> {
    if let Some(udp) = &config.sources.udp
        && udp.enabled
    {
        if udp.num_workers == 0 {
            return Err(ConfigError::invalid_value(
                "sources.udp",
                "num_workers",
                "must be greater than 0",
            ));
        }
        if udp.max_datagram_size == 0 {
            return Err(ConfigError::invalid_value(
                "sources.udp",
                "max_datagram_size",
                "must be greater than 0",
            ));
        }
    }
    Ok(())
}

fn validate_metrics(config: &Config) -> Result<()> {
    if config.metrics.enabled {
        require_period("metrics", "interval", config.metrics.interval)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn parse(toml: &str) -> Result<Config> {
        Config::from_str(toml)
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = parse("[buffers]\nprocess_capacity = 0").unwrap_err();
        assert!(err.to_string().contains("process_capacity"));
    }

    #[test]
    fn test_inverted_watermarks_rejected() {
        let err = parse("[admission]\nhigh_water = 50.0\nlow_water = 60.0").unwrap_err();
        assert!(matches!(err, ConfigError::InvertedWatermarks { .. }));
    }

    #[test]
    fn test_equal_watermarks_rejected() {
        let err = parse("[admission]\nhigh_water = 70.0\nlow_water = 70.0").unwrap_err();
        assert!(matches!(err, ConfigError::InvertedWatermarks { .. }));
    }

    #[test]
    fn test_watermark_out_of_range_rejected() {
        let err = parse("[admission]\nhigh_water = 150.0").unwrap_err();
        assert!(err.to_string().contains("high_water"));
    }

    #[test]
    fn test_unreachable_watermarks_rejected() {
        let err = parse("[admission]\nhigh_water = 100.0").unwrap_err();
        assert!(err.to_string().contains("high_water"));

        let err = parse("[admission]\nlow_water = 0.0").unwrap_err();
        assert!(err.to_string().contains("low_water"));

        assert!(parse("[admission]\nhigh_water = 99.9\nlow_water = 0.1").is_ok());
    }

    #[test]
    fn test_max_chunks_bounds() {
        assert!(parse("[assembler]\nmax_chunks = 0").is_err());
        assert!(parse("[assembler]\nmax_chunks = 129").is_err());
        assert!(parse("[assembler]\nmax_chunks = 1").is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = parse("[dispatcher]\nbatch_size = 0").unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_backoff_order_rejected() {
        let toml = r#"
[dispatcher]
initial_backoff = "10s"
max_backoff = "1s"
"#;
        assert!(parse(toml).is_err());
    }

    #[test]
    fn test_file_sink_requires_path() {
        let err = parse("[sink]\ntype = \"file\"").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField {
                section: "sink",
                field: "path"
            }
        ));
    }

    #[test]
    fn test_zero_segment_size_rejected() {
        assert!(parse("[journal]\nmax_segment_size = 0").is_err());
    }

    #[test]
    fn test_every_n_zero_rejected() {
        assert!(parse("[journal]\nfsync = { every_n = 0 }").is_err());
    }

    #[test]
    fn test_zero_periods_rejected() {
        for (section, field) in [
            ("journal", "flush_interval"),
            ("journal", "cleanup_interval"),
            ("assembler", "sweep_interval"),
            ("dispatcher", "flush_interval"),
            ("metrics", "interval"),
        ] {
            let toml = format!("[{}]\n{} = \"0s\"", section, field);
            match parse(&toml) {
                Err(ConfigError::InvalidValue {
                    section: s,
                    field: f,
                    ..
                }) => assert_eq!((s, f), (section, field)),
                other => panic!("{}.{} = 0s accepted: {:?}", section, field, other),
            }
        }
    }

    #[test]
    fn test_zero_metrics_interval_ok_when_disabled() {
        assert!(parse("[metrics]\nenabled = false\ninterval = \"0s\"").is_ok());
    }

    #[test]
    fn test_disabled_udp_not_validated() {
        let toml = r#"
[sources.udp]
enabled = false
num_workers = 0
"#;
        assert!(parse(toml).is_ok());
    }
}
