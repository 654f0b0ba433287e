//! Incremental record accumulator.
//!
//! The recognition stream re-emits the *entire* text produced so far on every
//! step, and a later snapshot may revise or even shorten earlier text. The
//! accumulator is therefore a reducer over the latest snapshot only: each
//! [`RecordAccumulator::observe`] sanitises and reparses the whole snapshot and
//! replaces the current record. Nothing from a previous snapshot is merged in.

use crate::pipeline::{parse, sanitize};
use crate::record::Record;
use tracing::debug;

/// Best current view of a record while a stream is in flight.
#[derive(Debug, Clone, Default)]
pub struct RecordAccumulator {
    normalize_keys: bool,
    record: Record,
    observed: usize,
}

impl RecordAccumulator {
    pub fn new(normalize_keys: bool) -> Self {
        Self {
            normalize_keys,
            ..Self::default()
        }
    }

    /// Reparse the full cumulative text and make it the current record.
    pub fn observe(&mut self, snapshot: &str) -> &Record {
        self.observed += 1;
        self.record = reduce(snapshot, self.normalize_keys);
        debug!(
            "Snapshot {}: {} bytes → {} fields",
            self.observed,
            snapshot.len(),
            self.record.len()
        );
        &self.record
    }

    /// The record parsed from the most recent snapshot (empty before the first).
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Number of snapshots observed so far.
    pub fn observed(&self) -> usize {
        self.observed
    }

    pub fn into_record(self) -> Record {
        self.record
    }
}

/// Pure snapshot → record reduction shared by the accumulator and callers that
/// only hold a final transcript.
pub fn reduce(snapshot: &str, normalize_keys: bool) -> Record {
    let cleaned = sanitize::clean_snapshot(snapshot);
    if normalize_keys {
        parse::parse_record(&sanitize::normalize_keys(&cleaned))
    } else {
        parse::parse_record(&cleaned)
    }
}
