//! Sink configuration
//!
//! The pipeline dispatches to exactly one downstream sink, selected by
//! `type` when the pipeline is built.
//!
//! ```toml
//! [sink]
//! type = "file"
//! path = "logs/messages.log"
//! ```

use serde::Deserialize;
use std::path::PathBuf;

/// Configuration for the downstream sink
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Discard everything (benchmarking)
    Null,

    /// One line per message on stdout
    Stdout(StdoutSinkConfig),

    /// Append one line per message to a file
    File(FileSinkConfig),
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self::Stdout(StdoutSinkConfig::default())
    }
}

impl SinkConfig {
    /// Get the sink type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Stdout(_) => "stdout",
            Self::File(_) => "file",
        }
    }
}

/// Stdout sink configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StdoutSinkConfig {
    /// Prefix each line with the journal offset
    pub show_offsets: bool,
}

/// File sink configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileSinkConfig {
    /// Output file (required)
    pub path: PathBuf,

    /// fsync after every batch
    pub sync: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        sink: SinkConfig,
    }

    #[test]
    fn test_default_is_stdout() {
        assert_eq!(SinkConfig::default().type_name(), "stdout");
    }

    #[test]
    fn test_deserialize_null() {
        let w: Wrapper = toml::from_str("[sink]\ntype = \"null\"").unwrap();
        assert_eq!(w.sink, SinkConfig::Null);
    }

    #[test]
    fn test_deserialize_file() {
        let toml = r#"
[sink]
type = "file"
path = "out/messages.log"
sync = true
"#;
        let w: Wrapper = toml::from_str(toml).unwrap();
        match w.sink {
            SinkConfig::File(file) => {
                assert_eq!(file.path, PathBuf::from("out/messages.log"));
                assert!(file.sync);
            }
            other => panic!("expected file sink, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result: Result<Wrapper, _> = toml::from_str("[sink]\ntype = \"clickhouse\"");
        assert!(result.is_err());
    }
}
