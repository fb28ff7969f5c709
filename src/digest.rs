use std::cmp::Ordering;

use data_encoding::HEXLOWER;
use sha1::{Digest, Sha1};

use crate::error::{Result, SortError};

pub const DIGEST_HEX_LEN: usize = 40;

/// A 160-bit content address for the key columns of a row.
///
/// Two rows share a digest exactly when their key columns are equal, and the
/// lexicographic order of digests spreads arbitrary key distributions
/// uniformly, which keeps spill runs balanced no matter how skewed the input
/// keys are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowDigest([u8; 20]);

impl RowDigest {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Render as 40 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        HEXLOWER.encode(&self.0)
    }

    /// Decode the 40-character lowercase hex rendering produced by
    /// [RowDigest::to_hex].
    pub fn from_hex(hex: &[u8]) -> Result<RowDigest> {
        if hex.len() != DIGEST_HEX_LEN {
            return Err(SortError::corrupt_run(format!(
                "digest length {} is not {}",
                hex.len(),
                DIGEST_HEX_LEN
            )));
        }
        let mut bytes = [0u8; 20];
        let decoded = HEXLOWER
            .decode(hex)
            .map_err(|e| SortError::corrupt_run(format!("digest is not lowercase hex: {}", e)))?;
        bytes.copy_from_slice(&decoded);
        Ok(RowDigest(bytes))
    }
}

impl PartialOrd<Self> for RowDigest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RowDigest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

/// Compute the digest of `row` over `key_columns`.
///
/// The hash input is `source_id` followed by a comma byte and the column text
/// for each key column in order. The comma precedes every value, so
/// `["ab", "c"]` and `["a", "bc"]` hash differently. The separator and the
/// `source_id` prefix are part of the public contract: digests are stable
/// across processes and releases.
pub fn digest_row(source_id: &str, row: &[String], key_columns: &[usize]) -> Result<RowDigest> {
    let mut hasher = Sha1::new();
    hasher.update(source_id.as_bytes());

    for &col in key_columns {
        let value = row.get(col).ok_or(SortError::BadKey {
            index: col,
            columns: row.len(),
        })?;
        hasher.update(b",");
        hasher.update(value.as_bytes());
    }

    Ok(RowDigest(hasher.finalize().into()))
}
