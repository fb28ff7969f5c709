use std::cmp::{Ordering, Reverse};

use crate::digest::RowDigest;

/// One buffered row together with its sort key.
///
/// `sequence` is the recency tiebreak: among records sharing a digest, a
/// higher sequence means a newer row. The sort order is digest ascending,
/// sequence descending, so the newest variants of a key surface first and a
/// per-key retention cap can drop the tail of each digest group as it streams
/// past.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SortRecord {
    pub(crate) digest: RowDigest,
    pub(crate) sequence: u64,
    pub(crate) fields: Vec<String>,
}

impl SortRecord {
    /// Approximate heap footprint, used against the sorter's memory budget.
    /// The estimate only needs to be proportional: field bytes plus a constant
    /// per-record overhead.
    pub(crate) fn estimated_size(&self) -> usize {
        let field_bytes: usize = self.fields.iter().map(|f| f.len()).sum();
        field_bytes
            + self.fields.len() * std::mem::size_of::<String>()
            + std::mem::size_of::<SortRecord>()
    }
}

impl PartialOrd<Self> for SortRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.digest, Reverse(self.sequence)).cmp(&(&other.digest, Reverse(other.sequence)))
    }
}
