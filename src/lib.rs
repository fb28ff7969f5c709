//! This crate implements an external merge sort for tabular row data, for example
//! CSV exports that are too large to sort in memory.
//!
//! Rows are keyed by a content-addressed digest: the SHA-1 of the values of a
//! caller-selected list of key columns, rendered as 40 lowercase hex characters.
//! Sorting by digest distributes arbitrary key distributions uniformly across
//! spill runs while still grouping rows with equal keys together, which makes a
//! per-key retention cap ("keep the newest N rows for each key") a streaming
//! filter over the merged output.
//!
//! The sorted output can be consumed in batches or encoded as a PostgreSQL
//! COPY BINARY stream suitable for `COPY ... FROM ... (FORMAT binary)`,
//! including EWKB point encoding for longitude/latitude columns.
//!
//! # Examples
//! ```
//! use std::path::Path;
//! use csv_row_sort::sorter::Sorter;
//!
//! // sort a CSV file by the digest of its first two columns, keeping at most
//! // 200 rows per key, then emit a PostgreSQL binary COPY file
//! fn sort_and_copy(input: &Path, output: &Path) -> Result<(), csv_row_sort::error::SortError> {
//!     let mut sorter = Sorter::new("source-1", "source-key", vec![0, 1], None, 100);
//!     sorter.add_file(input)?;
//!     let stats = sorter.sort()?;
//!     log::info!("sorted {} rows from {} spill runs", stats.total_rows, stats.run_count);
//!     sorter.write_binary_postgres_file(output)?;
//!     Ok(())
//! }
//! ```
//!

pub(crate) mod config;
pub(crate) mod copy_writer;
pub(crate) mod geometry;
pub(crate) mod merge;
pub(crate) mod record;
pub(crate) mod run_file;
pub(crate) mod unmerged_run;

pub mod dedupe;
pub mod digest;
pub mod error;
pub mod rule;
pub mod rule_type;
pub mod sorter;
pub mod validation;
