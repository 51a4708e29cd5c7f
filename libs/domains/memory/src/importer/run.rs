use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use crate::error::MemoryError;
use crate::identity::ContentAddress;
use crate::models::ImportReport;

/// State shared by every worker of one import run.
///
/// Locks are held only for the check-and-insert or the counter update,
/// never across an await.
#[derive(Debug, Default)]
pub(crate) struct ImportRun {
    seen: Mutex<HashSet<ContentAddress>>,
    tally: Mutex<ImportReport>,
}

impl ImportRun {
    /// Reserve `address` for this run. `false` if it was already seen.
    pub(crate) fn claim(&self, address: ContentAddress) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address)
    }

    pub(crate) fn imported(&self, count: u64) {
        let mut tally = self.tally.lock().unwrap_or_else(PoisonError::into_inner);
        tally.imported += count;
    }

    /// Count `count` records as skipped, keeping `error` if it is the first.
    pub(crate) fn skipped(&self, count: u64, error: Option<MemoryError>) {
        let mut tally = self.tally.lock().unwrap_or_else(PoisonError::into_inner);
        tally.skipped += count;
        if tally.first_error.is_none() {
            tally.first_error = error;
        }
    }

    /// Current (imported, skipped) totals.
    pub(crate) fn counts(&self) -> (u64, u64) {
        let tally = self.tally.lock().unwrap_or_else(PoisonError::into_inner);
        (tally.imported, tally.skipped)
    }

    /// Take the final report. The run is left empty.
    pub(crate) fn finish(&self) -> ImportReport {
        std::mem::take(&mut *self.tally.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
