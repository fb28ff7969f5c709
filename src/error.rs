use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SortError>;

/// Errors surfaced by the sorter, the deduper and the COPY BINARY encoder.
///
/// Per-row validation failures are not errors; they are counted on the sorter
/// and the offending row is dropped. Every variant here is fatal to the
/// operation that produced it, and drives the owning [Sorter](crate::sorter::Sorter)
/// into a failed state where subsequent operations return [SortError::State].
#[derive(Debug, Error)]
pub enum SortError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("key column {index} out of range for row with {columns} columns")]
    BadKey { index: usize, columns: usize },

    #[error("corrupt run file: {0}")]
    CorruptRun(String),

    #[error("illegal sorter state: {0}")]
    State(String),

    #[error("no headers found in {}", .0.display())]
    NoHeadersFound(PathBuf),

    #[error("no records to sort")]
    NoRecordsFound,

    #[error("COPY BINARY encoding failed: {0}")]
    Encode(String),
}

impl SortError {
    pub(crate) fn corrupt_run(message: impl Into<String>) -> Self {
        Self::CorruptRun(message.into())
    }

    pub(crate) fn state(message: impl Into<String>) -> Self {
        Self::State(message.into())
    }
}
