//! Stdout sink - one line per message
//!
//! Debug output for development and small deployments. Each batch is
//! formatted into one buffer and written with a single call so lines from
//! different batches never interleave.

use async_trait::async_trait;
use sluice_config::StdoutSinkConfig;
use sluice_journal::JournalEntry;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::common::{Sink, SinkError, format_batch};

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Writes batches as text lines to stdout
pub struct StdoutSink {
    config: StdoutSinkConfig,
    writer: Mutex<BoxedWriter>,
}

impl std::fmt::Debug for StdoutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdoutSink")
            .field("config", &self.config)
            .finish()
    }
}

impl StdoutSink {
    /// Create a sink writing to the process stdout
    pub fn new(config: StdoutSinkConfig) -> Self {
        Self::with_writer(config, tokio::io::stdout())
    }

    /// Create a sink writing to any async writer
    pub fn with_writer(
        config: StdoutSinkConfig,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            config,
            writer: Mutex::new(Box::new(writer)),
        }
    }
}

#[async_trait]
impl Sink for StdoutSink {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn write(&self, batch: &[JournalEntry]) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }
        let out = format_batch(batch, self.config.show_offsets);

        let mut writer = self.writer.lock().await;
        writer.write_all(out.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.writer.lock().await.flush().await?;
        Ok(())
    }
}
