//! Common types shared by all sinks
//!
//! The `Sink` trait, its error type and the line format used by the text
//! sinks.

use std::fmt::Write as FmtWrite;

use async_trait::async_trait;
use chrono::SecondsFormat;
use sluice_journal::JournalEntry;
use thiserror::Error;

/// Downstream destination for dispatched batches
///
/// A write either accepts the whole batch or fails; the dispatcher decides
/// whether to retry.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Sink type name for logging and metrics
    fn name(&self) -> &'static str;

    /// Write one batch
    ///
    /// # Errors
    ///
    /// Returns `SinkError` if the batch was not durably accepted.
    async fn write(&self, batch: &[JournalEntry]) -> Result<(), SinkError>;

    /// Push any buffered output to its destination
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Common sink errors
#[derive(Debug, Error)]
pub enum SinkError {
    /// Sink initialization failed
    #[error("failed to initialize sink: {0}")]
    Init(String),

    /// Failed to write data
    #[error("write failed: {0}")]
    Write(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sink no longer accepts writes
    #[error("sink closed")]
    Closed,
}

impl SinkError {
    /// Create an initialization error
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }

    /// Create a write error
    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }
}

/// Append one entry as a single text line
///
/// `{received_at} {payload}` with an optional `[offset]` prefix. Control
/// characters in UTF-8 payloads are escaped so every entry stays on one
/// line; binary payloads are hex encoded.
pub fn format_line(entry: &JournalEntry, with_offset: bool, buf: &mut String) {
    if with_offset {
        let _ = write!(buf, "[{}] ", entry.offset);
    }
    buf.push_str(
        &entry
            .received_at
            .to_rfc3339_opts(SecondsFormat::Millis, true),
    );
    buf.push(' ');
    append_escaped_payload(buf, &entry.payload);
    buf.push('\n');
}

/// Format a whole batch, one line per entry
pub fn format_batch(batch: &[JournalEntry], with_offset: bool) -> String {
    let mut buf = String::with_capacity(batch.iter().map(|e| e.len() + 32).sum());
    for entry in batch {
        format_line(entry, with_offset, &mut buf);
    }
    buf
}

fn append_escaped_payload(buf: &mut String, payload: &[u8]) {
    if let Ok(text) = std::str::from_utf8(payload) {
        for ch in text.chars() {
            match ch {
                '\n' => buf.push_str("\\n"),
                '\r' => buf.push_str("\\r"),
                '\t' => buf.push_str("\\t"),
                '\\' => buf.push_str("\\\\"),
                c if c.is_control() => {
                    let _ = write!(buf, "\\x{:02x}", c as u32);
                }
                c => buf.push(c),
            }
        }
    } else {
        const MAX_HEX_BYTES: usize = 256;
        let shown = payload.len().min(MAX_HEX_BYTES);

        buf.push_str("0x");
        for byte in &payload[..shown] {
            let _ = write!(buf, "{:02x}", byte);
        }
        if payload.len() > shown {
            let _ = write!(buf, "...(+{} bytes)", payload.len() - shown);
        }
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod common_test;
