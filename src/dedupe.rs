use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{Result, SortError};
use crate::sorter::Sorter;

const OUTPUT_BATCH_SIZE: usize = 10_000;

/// Counters returned by [dedupe_file].
#[derive(Debug, Clone, Default)]
pub struct DedupeStats {
    pub rows_read: usize,
    pub rows_written: usize,
    pub run_count: usize,
}

/// Deduplicate the CSV at `input` into a new CSV at `output`.
///
/// Data rows are sorted by the digest of `key_columns` and at most
/// `max_records_per_key` rows survive per key, later rows winning over
/// earlier ones. The output carries the input's header line followed by the
/// surviving rows in digest order. A header-only input produces a
/// header-only output; an empty input is an error.
pub fn dedupe_file(
    input: &Path,
    output: &Path,
    key_columns: Vec<usize>,
    max_records_per_key: usize,
    buffer_mb: usize,
) -> Result<DedupeStats> {
    let file = File::open(input)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(SortError::NoHeadersFound(input.to_path_buf()));
    }

    let mut sorter = Sorter::new("", "", key_columns, None, buffer_mb);
    sorter.with_max_records_per_key(max_records_per_key);

    let mut record = csv::StringRecord::new();
    let mut rows_read = 0;
    while reader.read_record(&mut record)? {
        let row: Vec<String> = record.iter().map(|field| field.to_string()).collect();
        sorter.add_row_at(row, rows_read as u64)?;
        rows_read += 1;
    }

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(output)?;
    writer.write_record(&headers)?;

    if rows_read == 0 {
        writer.flush()?;
        log::info!("no data rows in {}, wrote header only", input.display());
        return Ok(DedupeStats::default());
    }

    let stats = sorter.sort()?;
    sorter.each_batch(OUTPUT_BATCH_SIZE, |batch| {
        for (_digest, fields) in batch {
            writer.write_record(fields)?;
        }
        Ok(())
    })?;
    writer.flush()?;

    log::info!(
        "deduplicated {}: {} rows in, {} rows out",
        input.display(),
        rows_read,
        stats.total_rows
    );
    Ok(DedupeStats {
        rows_read,
        rows_written: stats.total_rows,
        run_count: stats.run_count,
    })
}
