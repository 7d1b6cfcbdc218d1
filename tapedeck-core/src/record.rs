//! The timestamped message log.
//!
//! A [`TimestampedLog`] is an ordered, append-only sequence of records, each
//! carrying the elapsed seconds since the owning session's recording start
//! and an opaque payload. Payloads are never inspected, only moved.

use serde::{Deserialize, Serialize};

/// One captured message: elapsed seconds since recording start plus payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Elapsed seconds since the session's recording start
    pub offset: f64,
    /// Opaque message bytes
    pub payload: Vec<u8>,
}

/// Ordered sequence of timestamped records.
///
/// Recording appends in real time, so offsets are non-decreasing by
/// construction and `append` does not validate. A log restored from storage
/// may violate that; call [`TimestampedLog::ensure_sorted`] before replay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimestampedLog {
    records: Vec<Record>,
}

impl TimestampedLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Append a record. O(1) amortized, offset not validated.
    pub fn append(&mut self, offset: f64, payload: Vec<u8>) {
        self.records.push(Record { offset, payload });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    /// Whether offsets are non-decreasing.
    pub fn is_sorted(&self) -> bool {
        self.records.windows(2).all(|w| w[0].offset <= w[1].offset)
    }

    /// Stable-sort the records by offset if any are out of order.
    ///
    /// Stability matters: records with tied offsets keep their original
    /// relative order. Returns whether a sort was necessary.
    pub fn ensure_sorted(&mut self) -> bool {
        if self.is_sorted() {
            return false;
        }
        self.records
            .sort_by(|a, b| a.offset.total_cmp(&b.offset));
        true
    }

    /// Lowest index whose offset is >= `position`.
    ///
    /// Returns `len()` when every offset is below `position`. Assumes the
    /// log is offset-sorted.
    pub fn first_index_at(&self, position: f64) -> usize {
        self.records.partition_point(|r| r.offset < position)
    }
}
