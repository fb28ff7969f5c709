use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::digest::{RowDigest, DIGEST_HEX_LEN};
use crate::error::{Result, SortError};
use crate::record::SortRecord;

pub(crate) const RUN_BUFFER_CAPACITY: usize = 4 * 1024 * 1024;

/// Handle for a spilled run: a file of framed records in sorted order.
#[derive(Debug)]
pub(crate) struct RunFile {
    path: PathBuf,
    records: usize,
}

impl RunFile {
    pub(crate) fn new(path: PathBuf, records: usize) -> RunFile {
        RunFile { path, records }
    }

    pub(crate) fn path(&self) -> &PathBuf {
        &self.path
    }

    pub(crate) fn records(&self) -> usize {
        self.records
    }
}

/// Append one framed record:
/// digest (40 hex bytes), sequence (u64 LE), field count (u32 LE), then each
/// field as length (u32 LE) + UTF-8 bytes.
pub(crate) fn write_record<W: Write>(writer: &mut W, record: &SortRecord) -> Result<()> {
    writer.write_all(record.digest.to_hex().as_bytes())?;
    writer.write_u64::<LittleEndian>(record.sequence)?;
    writer.write_u32::<LittleEndian>(record.fields.len() as u32)?;
    for field in &record.fields {
        writer.write_u32::<LittleEndian>(field.len() as u32)?;
        writer.write_all(field.as_bytes())?;
    }
    Ok(())
}

/// Read the next framed record, or `None` on a clean end of stream. A stream
/// that ends inside a frame, a digest that is not lowercase hex, or a field
/// that is not UTF-8 is a corrupt run.
pub(crate) fn read_record<R: Read>(reader: &mut R) -> Result<Option<SortRecord>> {
    let mut hex = [0u8; DIGEST_HEX_LEN];
    if !read_digest_or_eof(reader, &mut hex)? {
        return Ok(None);
    }
    let digest = RowDigest::from_hex(&hex)?;

    let sequence = reader.read_u64::<LittleEndian>().map_err(map_frame_error)?;
    let field_count = reader.read_u32::<LittleEndian>().map_err(map_frame_error)? as usize;

    let mut fields = Vec::with_capacity(field_count);
    for _ in 0..field_count {
        let len = reader.read_u32::<LittleEndian>().map_err(map_frame_error)? as usize;
        let mut bytes = vec![0u8; len];
        reader.read_exact(&mut bytes).map_err(map_frame_error)?;
        let field = String::from_utf8(bytes)
            .map_err(|e| SortError::corrupt_run(format!("field is not UTF-8: {}", e)))?;
        fields.push(field);
    }

    Ok(Some(SortRecord {
        digest,
        sequence,
        fields,
    }))
}

// Distinguishes a stream ending exactly between records from one ending
// mid-frame.
fn read_digest_or_eof<R: Read>(reader: &mut R, hex: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < hex.len() {
        let count = reader.read(&mut hex[filled..])?;
        if count == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(SortError::corrupt_run(format!(
                "run ends inside a digest after {} bytes",
                filled
            )));
        }
        filled += count;
    }
    Ok(true)
}

fn map_frame_error(error: std::io::Error) -> SortError {
    if error.kind() == ErrorKind::UnexpectedEof {
        SortError::corrupt_run("run ends inside a record frame".to_string())
    } else {
        SortError::Io(error)
    }
}
