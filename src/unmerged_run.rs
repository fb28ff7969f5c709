use std::cmp::Ordering;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use crate::record::SortRecord;
use crate::run_file::{read_record, RUN_BUFFER_CAPACITY};
use crate::error::Result;

/// A spilled run being consumed by the merge. Holds the current head record
/// so runs can be ordered against each other in a heap.
#[derive(Debug)]
pub(crate) struct UnmergedRun {
    path: PathBuf,
    run_id: u64,
    reader: BufReader<File>,
    head: Option<SortRecord>,
}

impl UnmergedRun {
    pub(crate) fn new(path: PathBuf, run_id: u64) -> Result<UnmergedRun> {
        let file = File::open(&path)?;
        let mut reader = BufReader::with_capacity(RUN_BUFFER_CAPACITY, file);
        let head = read_record(&mut reader)?;
        Ok(UnmergedRun {
            path,
            run_id,
            reader,
            head,
        })
    }

    /// Take the head record and refill it from the stream. Returns `None`
    /// once the run is exhausted.
    pub(crate) fn next_record(&mut self) -> Result<Option<SortRecord>> {
        let refill = read_record(&mut self.reader)?;
        Ok(std::mem::replace(&mut self.head, refill))
    }

    pub(crate) fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Eq for UnmergedRun {}

impl PartialEq<Self> for UnmergedRun {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd<Self> for UnmergedRun {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UnmergedRun {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.head, &other.head) {
            (None, None) => Ordering::Equal,
            // none > some so exhausted runs pop from the BinaryHeap first
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            // comparisons are flipped to make the max-heap behave as a min-heap;
            // run_id breaks ties between equal heads to keep the order strict
            (Some(left), Some(right)) => right
                .cmp(left)
                .then_with(|| other.run_id.cmp(&self.run_id)),
        }
    }
}
