//! Journal work on the blocking pool
//!
//! Reads and flushes touch disk (a flush fsyncs), so the async loops hand
//! them to `spawn_blocking` instead of running them on a runtime thread.

use std::sync::Arc;

use sluice_journal::CommitLogJournal;

use crate::error::{PipelineError, Result};

/// Run `op` against the journal on tokio's blocking pool
///
/// `name` identifies the operation if the blocking task panics.
pub(crate) async fn with_journal<T, F>(
    name: &'static str,
    journal: &Arc<CommitLogJournal>,
    op: F,
) -> Result<T>
where
    F: FnOnce(&CommitLogJournal) -> sluice_journal::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let journal = Arc::clone(journal);
    tokio::task::spawn_blocking(move || op(&journal))
        .await
        .map_err(|e| PipelineError::Task {
            name,
            reason: e.to_string(),
        })?
        .map_err(PipelineError::from)
}
