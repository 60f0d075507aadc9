//! Sink selection
//!
//! The dispatcher writes to exactly one sink, chosen once from
//! configuration when the pipeline is built.

use async_trait::async_trait;
use sluice_config::SinkConfig;
use sluice_journal::JournalEntry;

use crate::common::{Sink, SinkError};
use crate::file::FileSink;
use crate::null::NullSink;
use crate::stdout::StdoutSink;

/// The configured downstream sink
#[derive(Debug)]
pub enum SinkKind {
    Null(NullSink),
    Stdout(StdoutSink),
    File(FileSink),
}

impl SinkKind {
    /// Build the sink described by `config`
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Init` if the sink cannot be opened.
    pub fn from_config(config: &SinkConfig) -> Result<Self, SinkError> {
        Ok(match config {
            SinkConfig::Null => Self::Null(NullSink::new()),
            SinkConfig::Stdout(stdout) => Self::Stdout(StdoutSink::new(stdout.clone())),
            SinkConfig::File(file) => Self::File(FileSink::open(file)?),
        })
    }
}

#[async_trait]
impl Sink for SinkKind {
    fn name(&self) -> &'static str {
        match self {
            Self::Null(sink) => sink.name(),
            Self::Stdout(sink) => sink.name(),
            Self::File(sink) => sink.name(),
        }
    }

    async fn write(&self, batch: &[JournalEntry]) -> Result<(), SinkError> {
        match self {
            Self::Null(sink) => sink.write(batch).await,
            Self::Stdout(sink) => sink.write(batch).await,
            Self::File(sink) => sink.write(batch).await,
        }
    }

    async fn flush(&self) -> Result<(), SinkError> {
        match self {
            Self::Null(sink) => sink.flush().await,
            Self::Stdout(sink) => sink.flush().await,
            Self::File(sink) => sink.flush().await,
        }
    }
}
