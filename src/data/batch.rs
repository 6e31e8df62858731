//! Batch persistence of extracted candidates.

use tracing::{debug, warn};

use crate::data::models::CandidateRecord;
use crate::data::store::{InsertOutcome, RecordStore};

/// Tally of one batch save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub saved: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// Write each candidate if its id is not stored yet.
///
/// Records are written one at a time, in order. Existence checks are not safe
/// under concurrent writes of the same id, so this must not be parallelized.
/// A failed write is logged and counted; the remaining records are still attempted.
pub async fn upsert_if_absent(
    store: &dyn RecordStore,
    candidates: &[CandidateRecord],
) -> UpsertCounts {
    let mut counts = UpsertCounts::default();

    for candidate in candidates {
        match store.insert_if_absent(candidate).await {
            Ok(InsertOutcome::Inserted) => {
                debug!(id = %candidate.source_id, name = %candidate.name, "Saved new record");
                counts.saved += 1;
            }
            Ok(InsertOutcome::Duplicate) => counts.duplicates += 1,
            Err(e) => {
                warn!(id = %candidate.source_id, error = ?e, "Failed to save record, continuing");
                counts.failed += 1;
            }
        }
    }

    counts
}
