use std::io::{BufWriter, Write};

use byteorder::{BigEndian, WriteBytesExt};
use bytes::BytesMut;
use chrono::{DateTime, Utc};

use crate::error::{Result, SortError};
use crate::geometry::EwkbPoint;

const HEADER_MAGIC: &[u8] = b"PGCOPY\n\xff\r\n\0";

const COPY_BUFFER_CAPACITY: usize = 4 * 1024 * 1024;

// OID of the text type, the element type of the row_data text[] column
const TEXT_OID: i32 = 25;

// Columns per tuple: source_key, digest, geometry, row_data, created_at,
// updated_at
const COLUMN_COUNT: i16 = 6;

// 2000-01-01T00:00:00Z, the epoch of the PostgreSQL timestamp type
const PG_EPOCH_UNIX_MICROS: i64 = 946_684_800_000_000;

/// A writer for PostgreSQL binary COPY streams over the fixed sorter output
/// schema. Produces the exact framing `COPY ... FROM ... (FORMAT binary)`
/// expects: the 11-byte signature, u32 flags and extension length, i16
/// field-count-prefixed tuples with i32 length-prefixed fields (-1 for NULL),
/// and an i16 -1 trailer.
pub(crate) struct BinaryCopyWriter<W: Write> {
    writer: BufWriter<W>,
    buf: BytesMut,
}

impl<W: Write> BinaryCopyWriter<W> {
    pub(crate) fn new(writer: W) -> BinaryCopyWriter<W> {
        BinaryCopyWriter {
            writer: BufWriter::with_capacity(COPY_BUFFER_CAPACITY, writer),
            buf: BytesMut::new(),
        }
    }

    pub(crate) fn write_header(&mut self) -> Result<()> {
        self.writer.write_all(HEADER_MAGIC)?;
        self.writer.write_i32::<BigEndian>(0)?; // flags
        self.writer.write_i32::<BigEndian>(0)?; // header extension area length
        Ok(())
    }

    pub(crate) fn write_row(
        &mut self,
        source_key: &str,
        digest_hex: &str,
        point: Option<EwkbPoint>,
        fields: &[String],
        timestamp_micros: i64,
    ) -> Result<()> {
        self.writer.write_i16::<BigEndian>(COLUMN_COUNT)?;

        self.write_text(source_key)?;
        self.write_text(digest_hex)?;
        self.write_geometry(point)?;
        self.write_text_array(fields)?;
        self.write_timestamp(timestamp_micros)?;
        self.write_timestamp(timestamp_micros)?;

        Ok(())
    }

    pub(crate) fn write_trailer(&mut self) -> Result<()> {
        self.writer.write_i16::<BigEndian>(-1)?;
        self.writer.flush()?;
        Ok(())
    }

    fn write_text(&mut self, value: &str) -> Result<()> {
        self.writer
            .write_i32::<BigEndian>(field_len(value.len())?)?;
        self.writer.write_all(value.as_bytes())?;
        Ok(())
    }

    fn write_geometry(&mut self, point: Option<EwkbPoint>) -> Result<()> {
        match point {
            Some(point) => {
                self.buf.clear();
                point.write_ewkb(&mut BytesMutWriter(&mut self.buf))?;
                self.writer
                    .write_i32::<BigEndian>(field_len(self.buf.len())?)?;
                self.writer.write_all(&self.buf)?;
            }
            None => {
                self.writer.write_i32::<BigEndian>(-1)?;
            }
        }
        Ok(())
    }

    // One-dimensional array of non-null text elements with lower bound 1
    fn write_text_array(&mut self, fields: &[String]) -> Result<()> {
        let dim = i32::try_from(fields.len())
            .map_err(|_| SortError::Encode(format!("{} array elements exceed i32", fields.len())))?;

        self.buf.clear();
        self.buf.extend_from_slice(&1i32.to_be_bytes()); // ndim
        self.buf.extend_from_slice(&0i32.to_be_bytes()); // hasnull
        self.buf.extend_from_slice(&TEXT_OID.to_be_bytes()); // element type
        self.buf.extend_from_slice(&dim.to_be_bytes()); // dimension length
        self.buf.extend_from_slice(&1i32.to_be_bytes()); // lower bound
        for field in fields {
            self.buf
                .extend_from_slice(&field_len(field.len())?.to_be_bytes());
            self.buf.extend_from_slice(field.as_bytes());
        }

        self.writer
            .write_i32::<BigEndian>(field_len(self.buf.len())?)?;
        self.writer.write_all(&self.buf)?;
        Ok(())
    }

    fn write_timestamp(&mut self, micros: i64) -> Result<()> {
        self.writer
            .write_i32::<BigEndian>(std::mem::size_of::<i64>() as i32)?;
        self.writer.write_i64::<BigEndian>(micros)?;
        Ok(())
    }
}

/// Microseconds since the PostgreSQL timestamp epoch (2000-01-01 UTC).
pub(crate) fn pg_timestamp_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros() - PG_EPOCH_UNIX_MICROS
}

fn field_len(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| SortError::Encode(format!("field of {} bytes exceeds i32", len)))
}

struct BytesMutWriter<'a>(&'a mut BytesMut);

impl<'a> Write for BytesMutWriter<'a> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
