use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::TempDir;

use crate::config::Config;
use crate::copy_writer::{pg_timestamp_micros, BinaryCopyWriter};
use crate::digest::digest_row;
use crate::error::{Result, SortError};
use crate::geometry::EwkbPoint;
use crate::merge::{merge_runs, KeyRunLimiter};
use crate::record::SortRecord;
use crate::rule::ColumnRule;
use crate::run_file::{read_record, write_record, RunFile, RUN_BUFFER_CAPACITY};
use crate::unmerged_run::UnmergedRun;
use crate::validation::Validator;

const SORTED_OUTPUT_FILE: &str = "sorted.out";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SorterState {
    Configuring,
    Accumulating,
    Sorted,
    Iterating,
    EncodedCopy,
    Failed,
}

/// Counters returned by [Sorter::sort].
///
/// `total_rows_processed` counts every row seen, including rows rejected by
/// validation; `total_rows` is the surviving count after the per-key
/// retention cap.
#[derive(Debug, Clone, Default)]
pub struct SortStats {
    pub total_rows: usize,
    pub total_rows_processed: usize,
    pub failed_url_error_count: usize,
    pub failed_protocol_error_count: usize,
    pub error_count: usize,
    pub run_count: usize,
}

/// Sort arbitrarily many rows by the digest of their key columns using
/// bounded memory.
///
/// Rows accumulate in an in-memory buffer; when the buffer's estimated
/// footprint passes the configured budget it is sorted and spilled to a run
/// file in a private temporary directory. [Sorter::sort] merges the runs (or
/// sorts the buffer directly when nothing spilled), applies the per-key
/// retention cap, and materializes the sorted output for
/// [Sorter::each_batch] and [Sorter::write_binary_postgres_file].
///
/// A sorter is single-owner: it is not safe to share between threads, and its
/// temporary directory must not be shared with another sorter. All temporary
/// files are removed when the sorter is dropped.
///
/// # Examples
/// ```
/// use csv_row_sort::sorter::Sorter;
///
/// fn newest_per_key(rows: Vec<Vec<String>>) -> Result<Vec<Vec<String>>, csv_row_sort::error::SortError> {
///     let mut sorter = Sorter::new("source-1", "source-key", vec![0], None, 100);
///     sorter.with_max_records_per_key(1);
///     for row in rows {
///         sorter.add_row(row)?;
///     }
///     sorter.sort()?;
///     let mut survivors = Vec::new();
///     sorter.each_batch(1000, |batch| {
///         survivors.extend(batch.iter().map(|(_digest, fields)| fields.clone()));
///         Ok(())
///     })?;
///     Ok(survivors)
/// }
/// ```
pub struct Sorter {
    config: Config,
    state: SorterState,
    temp_dir: Option<TempDir>,
    buffer: Vec<SortRecord>,
    buffer_size: usize,
    runs: Vec<RunFile>,
    next_run_id: u64,
    next_sequence: u64,
    rows_seen: usize,
    run_count: usize,
    validator: Option<Validator>,
    output: Option<File>,
    total_rows: usize,
}

impl Sorter {
    /// Create a sorter for rows keyed by `key_columns` (0-based, order
    /// significant, repeats allowed).
    ///
    /// `source_id` participates in the digest as a constant prefix;
    /// `source_key` is carried opaquely into the first column of the COPY
    /// BINARY output. `geo_columns` is `(longitude index, latitude index)`
    /// for the optional EWKB point column. `buffer_mb` is the soft cap on
    /// the in-memory buffer.
    pub fn new(
        source_id: &str,
        source_key: &str,
        key_columns: Vec<usize>,
        geo_columns: Option<(usize, usize)>,
        buffer_mb: usize,
    ) -> Sorter {
        let config = Config::new(
            source_id.to_string(),
            source_key.to_string(),
            key_columns,
            geo_columns,
            buffer_mb * 1024 * 1024,
        );
        Sorter {
            config,
            state: SorterState::Configuring,
            temp_dir: None,
            buffer: Vec::new(),
            buffer_size: 0,
            runs: Vec::new(),
            next_run_id: 0,
            next_sequence: 0,
            rows_seen: 0,
            run_count: 0,
            validator: None,
            output: None,
            total_rows: 0,
        }
    }

    /// Set the parent directory for the sorter's private temporary directory.
    /// The default is the system temp dir; for large inputs prefer a
    /// directory on the same file system as the output. Takes effect before
    /// the first spill.
    pub fn with_tmp_dir(&mut self, tmp: PathBuf) {
        self.config.set_tmp(tmp);
    }

    /// Set how many rows survive per digest, newest first. The default is
    /// 200; zero disables the cap.
    pub fn with_max_records_per_key(&mut self, max_records_per_key: usize) {
        self.config.set_max_records_per_key(max_records_per_key);
    }

    /// Install per-column validation. Rows failing any rule are counted and
    /// dropped instead of sorted. When `error_log_path` is given, every
    /// failing field is appended to a CSV error log there.
    pub fn enable_validation(
        &mut self,
        rules: Vec<ColumnRule>,
        error_log_path: Option<&Path>,
    ) -> Result<()> {
        if self.state != SorterState::Configuring {
            return Err(SortError::state(
                "validation must be enabled before the first row",
            ));
        }
        self.validator = Some(Validator::new(rules, error_log_path)?);
        Ok(())
    }

    /// Add one row with an auto-assigned sequence. Returns `Ok(false)` when
    /// validation rejected the row.
    pub fn add_row(&mut self, row: Vec<String>) -> Result<bool> {
        let sequence = self.next_sequence;
        self.add_row_at(row, sequence)
    }

    /// Add one row with a caller-supplied sequence. Higher sequences are
    /// newer and win under the per-key retention cap.
    pub fn add_row_at(&mut self, row: Vec<String>, sequence: u64) -> Result<bool> {
        self.check_accumulating()?;
        self.state = SorterState::Accumulating;
        self.rows_seen += 1;
        self.next_sequence = self.next_sequence.max(sequence.saturating_add(1));

        if let Some(validator) = self.validator.as_mut() {
            if !validator.validate_row(&row) {
                return Ok(false);
            }
        }

        let digest = match digest_row(self.config.source_id(), &row, self.config.key_columns()) {
            Ok(digest) => digest,
            Err(e) => return self.fail(e),
        };
        let record = SortRecord {
            digest,
            sequence,
            fields: row,
        };

        let record_size = record.estimated_size();
        if self.buffer_size + record_size > self.config.buffer_bytes() && !self.buffer.is_empty() {
            if let Err(e) = self.spill_buffer() {
                return self.fail(e);
            }
        }

        self.buffer.push(record);
        self.buffer_size += record_size;
        Ok(true)
    }

    /// Parse the CSV at `path` and add every data row, skipping the header
    /// line. The sequence of each row is its 0-based data row index. A CSV
    /// parse error is fatal to the sorter.
    pub fn add_file(&mut self, path: &Path) -> Result<()> {
        self.check_accumulating()?;
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => return self.fail(e.into()),
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(BufReader::new(file));

        let mut record = csv::StringRecord::new();
        let mut position: u64 = 0;
        loop {
            match reader.read_record(&mut record) {
                Ok(true) => {
                    let row: Vec<String> = record.iter().map(|field| field.to_string()).collect();
                    self.add_row_at(row, position)?;
                    position += 1;
                }
                Ok(false) => break,
                Err(e) => return self.fail(e.into()),
            }
        }
        log::info!(
            "added {} rows from {}",
            position,
            path.display()
        );
        Ok(())
    }

    /// Sort everything accumulated so far and materialize the deduplicated
    /// output. When nothing spilled the buffer is sorted in memory;
    /// otherwise the buffer is flushed as a final run and all runs are
    /// k-way merged. Consumes and removes the run files.
    pub fn sort(&mut self) -> Result<SortStats> {
        match self.state {
            SorterState::Accumulating => {}
            SorterState::Configuring => return self.fail(SortError::NoRecordsFound),
            SorterState::Failed => return Err(failed_state()),
            _ => return Err(SortError::state("sorter output is already sorted")),
        }

        if let Some(validator) = self.validator.as_mut() {
            if let Err(e) = validator.flush_log() {
                return self.fail(e);
            }
        }

        match self.sort_to_output() {
            Ok(total_rows) => {
                self.total_rows = total_rows;
                self.state = SorterState::Sorted;
                log::info!(
                    "sorted {} rows ({} processed, {} runs)",
                    total_rows,
                    self.rows_seen,
                    self.run_count
                );
                Ok(self.stats())
            }
            Err(e) => self.fail(e),
        }
    }

    /// Iterate the sorted output in batches of at most `batch_size` items of
    /// `(digest hex, fields)`. Restartable: every call begins at the first
    /// record.
    pub fn each_batch<F>(&mut self, batch_size: usize, mut f: F) -> Result<()>
    where
        F: FnMut(&[(String, Vec<String>)]) -> Result<()>,
    {
        self.check_sorted()?;
        self.state = SorterState::Iterating;
        let batch_size = batch_size.max(1);

        let mut input = match self.open_sorted_output() {
            Ok(input) => input,
            Err(e) => return self.fail(e),
        };
        if let Err(e) = input.rewind() {
            return self.fail(e.into());
        }
        let mut reader = BufReader::with_capacity(RUN_BUFFER_CAPACITY, input);

        let mut batch: Vec<(String, Vec<String>)> = Vec::with_capacity(batch_size);
        loop {
            let record = match read_record(&mut reader) {
                Ok(record) => record,
                Err(e) => return self.fail(e),
            };
            match record {
                Some(record) => {
                    batch.push((record.digest.to_hex(), record.fields));
                    if batch.len() >= batch_size {
                        f(&batch)?;
                        batch.clear();
                    }
                }
                None => break,
            }
        }
        if !batch.is_empty() {
            f(&batch)?;
        }
        Ok(())
    }

    /// Encode the sorted output as a PostgreSQL COPY BINARY file at `path`
    /// and return the tuple count. Each tuple is `(source_key, digest hex,
    /// EWKB point or NULL, row fields as text[], created_at, updated_at)`
    /// with both timestamps taken once at the start of the call.
    pub fn write_binary_postgres_file(&mut self, path: &Path) -> Result<u64> {
        self.check_sorted()?;
        self.state = SorterState::EncodedCopy;

        match self.write_copy_file(path) {
            Ok(count) => {
                log::info!("wrote {} COPY BINARY tuples to {}", count, path.display());
                Ok(count)
            }
            Err(e) => self.fail(e),
        }
    }

    fn write_copy_file(&mut self, path: &Path) -> Result<u64> {
        let mut input = self.open_sorted_output()?;
        input.rewind()?;
        let mut reader = BufReader::with_capacity(RUN_BUFFER_CAPACITY, input);

        let mut writer = BinaryCopyWriter::new(File::create(path)?);
        let timestamp_micros = pg_timestamp_micros(Utc::now());
        writer.write_header()?;

        let mut count = 0;
        while let Some(record) = read_record(&mut reader)? {
            let point = self.config.geo_columns().and_then(|(lon_idx, lat_idx)| {
                let x: f64 = record.fields.get(lon_idx)?.parse().ok()?;
                let y: f64 = record.fields.get(lat_idx)?.parse().ok()?;
                Some(EwkbPoint::new(x, y))
            });
            writer.write_row(
                self.config.source_key(),
                &record.digest.to_hex(),
                point,
                &record.fields,
                timestamp_micros,
            )?;
            count += 1;
        }
        writer.write_trailer()?;
        Ok(count)
    }

    fn sort_to_output(&mut self) -> Result<usize> {
        let output = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.temp_dir()?.path().join(SORTED_OUTPUT_FILE))?;
        let mut writer = BufWriter::with_capacity(RUN_BUFFER_CAPACITY, &output);
        let mut limiter = KeyRunLimiter::new(self.config.max_records_per_key());

        let total_rows = if self.runs.is_empty() {
            self.buffer.sort_unstable();
            let mut emitted = 0;
            for record in self.buffer.drain(..) {
                if limiter.admit(&record.digest) {
                    write_record(&mut writer, &record)?;
                    emitted += 1;
                }
            }
            self.buffer_size = 0;
            emitted
        } else {
            if !self.buffer.is_empty() {
                self.spill_buffer()?;
            }
            let pending: usize = self.runs.iter().map(|run| run.records()).sum();
            log::debug!("merging {} runs holding {} records", self.runs.len(), pending);
            let mut unmerged = Vec::with_capacity(self.runs.len());
            for (run_id, run) in self.runs.drain(..).enumerate() {
                unmerged.push(UnmergedRun::new(run.path().clone(), run_id as u64)?);
            }
            merge_runs(unmerged, &mut limiter, &mut |record| {
                write_record(&mut writer, &record)
            })?
        };

        writer.flush()?;
        drop(writer);
        self.output = Some(output);
        Ok(total_rows)
    }

    // A second handle onto the sorted output file; the cursor is shared, so
    // callers rewind before reading.
    fn open_sorted_output(&self) -> Result<File> {
        let output = self.output.as_ref().expect("sorted output exists");
        Ok(output.try_clone()?)
    }

    fn spill_buffer(&mut self) -> Result<()> {
        self.buffer.sort_unstable();

        let run_id = self.next_run_id;
        self.next_run_id += 1;
        let path = self
            .temp_dir()?
            .path()
            .join(format!("run-{:06}.run", run_id));

        let file = File::create(&path)?;
        let mut writer = BufWriter::with_capacity(RUN_BUFFER_CAPACITY, file);
        let records = self.buffer.len();
        for record in self.buffer.drain(..) {
            write_record(&mut writer, &record)?;
        }
        writer.flush()?;

        log::debug!("spilled {} records to {}", records, path.display());
        self.runs.push(RunFile::new(path, records));
        self.run_count += 1;
        self.buffer_size = 0;
        Ok(())
    }

    fn temp_dir(&mut self) -> Result<&TempDir> {
        if self.temp_dir.is_none() {
            let builder_result = match self.config.tmp() {
                Some(root) => tempfile::Builder::new()
                    .prefix("csv-row-sort-")
                    .tempdir_in(root),
                None => tempfile::Builder::new().prefix("csv-row-sort-").tempdir(),
            };
            self.temp_dir = Some(builder_result?);
        }
        Ok(self.temp_dir.as_ref().unwrap())
    }

    fn stats(&self) -> SortStats {
        let (url_errors, protocol_errors) = match &self.validator {
            Some(validator) => (
                validator.failed_url_error_count(),
                validator.failed_protocol_error_count(),
            ),
            None => (0, 0),
        };
        SortStats {
            total_rows: self.total_rows,
            total_rows_processed: self.rows_seen,
            failed_url_error_count: url_errors,
            failed_protocol_error_count: protocol_errors,
            error_count: url_errors + protocol_errors,
            run_count: self.run_count,
        }
    }

    fn check_accumulating(&self) -> Result<()> {
        match self.state {
            SorterState::Configuring | SorterState::Accumulating => Ok(()),
            SorterState::Failed => Err(failed_state()),
            _ => Err(SortError::state("cannot add rows after sort")),
        }
    }

    fn check_sorted(&self) -> Result<()> {
        match self.state {
            SorterState::Sorted | SorterState::Iterating | SorterState::EncodedCopy => Ok(()),
            SorterState::Failed => Err(failed_state()),
            _ => Err(SortError::state("sorter output is not sorted yet")),
        }
    }

    fn fail<T>(&mut self, error: SortError) -> Result<T> {
        self.state = SorterState::Failed;
        Err(error)
    }
}

fn failed_state() -> SortError {
    SortError::state("sorter previously failed")
}
