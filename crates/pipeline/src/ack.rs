//! Acknowledgement tracking
//!
//! The reader registers every offset it hands to the process stage; the
//! dispatcher acknowledges offsets once their batch is delivered or
//! dropped. Batches finish out of order when several process workers run,
//! so the journal is only committed up to the highest offset whose
//! predecessors (among registered offsets) are all acknowledged.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use sluice_journal::CommitLogJournal;
use tracing::warn;

/// In-flight offsets between the journal reader and the dispatcher
#[derive(Debug)]
pub struct AckTracker {
    journal: Arc<CommitLogJournal>,
    /// Registered offset -> acknowledged
    in_flight: Mutex<BTreeMap<u64, bool>>,
}

impl AckTracker {
    /// Create a tracker committing to `journal`
    pub fn new(journal: Arc<CommitLogJournal>) -> Self {
        Self {
            journal,
            in_flight: Mutex::new(BTreeMap::new()),
        }
    }

    /// Mark `offset` as read and not yet delivered
    pub fn register(&self, offset: u64) {
        self.in_flight.lock().insert(offset, false);
    }

    /// Acknowledge delivered (or dropped) offsets
    ///
    /// Commits and returns the new committed offset if the contiguous
    /// acknowledged prefix advanced. Unknown offsets are ignored.
    pub fn ack(&self, offsets: impl IntoIterator<Item = u64>) -> Option<u64> {
        let commit_to = {
            let mut in_flight = self.in_flight.lock();
            for offset in offsets {
                if let Some(acked) = in_flight.get_mut(&offset) {
                    *acked = true;
                }
            }

            let mut commit_to = None;
            while let Some(entry) = in_flight.first_entry() {
                if !*entry.get() {
                    break;
                }
                commit_to = Some(*entry.key());
                entry.remove();
            }
            commit_to
        }?;

        match self.journal.commit(commit_to) {
            Ok(_) => Some(commit_to),
            Err(e) => {
                warn!(offset = commit_to, error = %e, "failed to commit journal offset");
                None
            }
        }
    }

    /// Offsets registered and not yet committed
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Lowest offset still waiting for its acknowledgement
    pub fn oldest_pending(&self) -> Option<u64> {
        self.in_flight
            .lock()
            .iter()
            .find_map(|(offset, acked)| (!acked).then_some(*offset))
    }
}
