//! File sink - append one line per message to a file
//!
//! The file is opened in append mode when the sink is built. Every batch
//! is formatted into one buffer, written, flushed and (with `sync = true`)
//! fsynced before the write returns, so an accepted batch is on disk.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sluice_config::FileSinkConfig;
use sluice_journal::JournalEntry;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

use crate::common::{Sink, SinkError, format_batch};

/// Appends batches as text lines to a file
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    sync: bool,
    file: Mutex<File>,
}

impl FileSink {
    /// Open (creating if needed) the configured file for appending
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Init` if the parent directory or file cannot be
    /// created.
    pub fn open(config: &FileSinkConfig) -> Result<Self, SinkError> {
        let path = config.path.clone();
        if path.as_os_str().is_empty() {
            return Err(SinkError::init("file sink requires a path"));
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                SinkError::init(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SinkError::init(format!("cannot open {}: {}", path.display(), e)))?;

        info!(path = %path.display(), sync = config.sync, "file sink opened");

        Ok(Self {
            path,
            sync: config.sync,
            file: Mutex::new(File::from_std(file)),
        })
    }

    /// Output file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Sink for FileSink {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn write(&self, batch: &[JournalEntry]) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }
        let out = format_batch(batch, false);

        let mut file = self.file.lock().await;
        file.write_all(out.as_bytes()).await?;
        file.flush().await?;
        if self.sync {
            file.sync_data().await?;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let mut file = self.file.lock().await;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }
}
