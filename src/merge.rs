use std::collections::BinaryHeap;

use crate::digest::RowDigest;
use crate::error::Result;
use crate::record::SortRecord;
use crate::unmerged_run::UnmergedRun;

/// Streaming per-key retention cap.
///
/// The merged stream arrives digest-ascending with the newest sequence first
/// inside each digest group, so capping a group is just counting from the
/// front of it: the first `cap` records of a group are exactly its newest.
#[derive(Debug)]
pub(crate) struct KeyRunLimiter {
    cap: usize,
    current: Option<RowDigest>,
    emitted: usize,
}

impl KeyRunLimiter {
    /// A cap of zero disables limiting.
    pub(crate) fn new(cap: usize) -> KeyRunLimiter {
        KeyRunLimiter {
            cap,
            current: None,
            emitted: 0,
        }
    }

    pub(crate) fn admit(&mut self, digest: &RowDigest) -> bool {
        if self.current != Some(*digest) {
            self.current = Some(*digest);
            self.emitted = 0;
        }
        if self.cap > 0 && self.emitted >= self.cap {
            return false;
        }
        self.emitted += 1;
        true
    }
}

/// K-way merge of sorted runs into `emit`, applying the retention cap.
/// Each run file is removed as soon as the merge exhausts it. Returns the
/// number of records emitted.
pub(crate) fn merge_runs<F>(
    runs: Vec<UnmergedRun>,
    limiter: &mut KeyRunLimiter,
    emit: &mut F,
) -> Result<usize>
where
    F: FnMut(SortRecord) -> Result<()>,
{
    let mut emitted = 0;
    let mut unmerged_runs: BinaryHeap<UnmergedRun> = runs.into_iter().collect();

    while unmerged_runs.len() > 1 {
        let mut current_min = unmerged_runs.pop().unwrap();
        let mut current_min_done = false;
        // comparison operators are flipped to work with BinaryHeap (Max Heap)
        while &current_min >= unmerged_runs.peek().unwrap() {
            match current_min.next_record()? {
                Some(record) => {
                    if limiter.admit(&record.digest) {
                        emit(record)?;
                        emitted += 1;
                    }
                }
                None => {
                    current_min_done = true;
                    std::fs::remove_file(current_min.path())?;
                    break;
                }
            }
        }
        if !current_min_done {
            unmerged_runs.push(current_min)
        }
    }

    if let Some(mut current_min) = unmerged_runs.pop() {
        while let Some(record) = current_min.next_record()? {
            if limiter.admit(&record.digest) {
                emit(record)?;
                emitted += 1;
            }
        }
        std::fs::remove_file(current_min.path())?;
    }

    Ok(emitted)
}
