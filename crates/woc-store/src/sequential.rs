//! Sequential stores: a `.idx` file of `;`-separated lines describing
//! compressed values laid back to back in a `.bin` content file.

use std::io::{BufRead, Lines, Read};
use std::path::PathBuf;

use woc_types::ObjectKey;

use crate::error::{StoreError, StoreResult};

/// One index line: `seq;offset;compressed_len[;full_len];hex_key`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub seq: u64,
    pub offset: u64,
    pub compressed_len: usize,
    /// Present on five-field lines.
    pub full_len: Option<usize>,
    pub key: ObjectKey,
}

impl IndexEntry {
    /// Parse one line. Returns `None` when the line is malformed.
    pub fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.trim().split(';').collect();
        let (offset, compressed_len, full_len, key) = match fields.as_slice() {
            [_, offset, len, full, key, ..] => (offset, len, Some(full), key),
            [_, offset, len, key] => (offset, len, None, key),
            _ => return None,
        };
        Some(Self {
            seq: fields[0].parse().ok()?,
            offset: offset.parse().ok()?,
            compressed_len: compressed_len.parse().ok()?,
            full_len: match full_len {
                Some(full) => Some(full.parse().ok()?),
                None => None,
            },
            key: ObjectKey::from_hex(key).ok()?,
        })
    }
}

/// Iterator over one shard of a sequential store, yielding each index entry
/// with its still-compressed bytes.
///
/// Values are read from the content file in index order; the stored offsets
/// are reported but not seeked to.
pub struct SequentialRecords {
    index_path: PathBuf,
    lines: Lines<Box<dyn BufRead + Send>>,
    data: Box<dyn BufRead + Send>,
    line_no: usize,
    failed: bool,
}

impl SequentialRecords {
    pub(crate) fn new(
        index_path: PathBuf,
        index: Box<dyn BufRead + Send>,
        data: Box<dyn BufRead + Send>,
    ) -> Self {
        Self {
            index_path,
            lines: index.lines(),
            data,
            line_no: 0,
            failed: false,
        }
    }

    fn read_entry(&mut self, line: &str) -> StoreResult<(IndexEntry, Vec<u8>)> {
        let entry = IndexEntry::parse(line).ok_or_else(|| {
            StoreError::corrupt(
                &self.index_path,
                format!("malformed index line {}: {line:?}", self.line_no),
            )
        })?;
        // The length is untrusted; grow the buffer as bytes arrive.
        let mut buf = Vec::new();
        let read = Read::by_ref(&mut self.data)
            .take(entry.compressed_len as u64)
            .read_to_end(&mut buf)?;
        if read < entry.compressed_len {
            return Err(StoreError::corrupt(
                &self.index_path,
                format!(
                    "line {} wants {} bytes, content file has {read}",
                    self.line_no, entry.compressed_len
                ),
            ));
        }
        Ok((entry, buf))
    }
}

impl Iterator for SequentialRecords {
    type Item = StoreResult<(IndexEntry, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            self.line_no += 1;
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e.into()));
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let result = self.read_entry(&line);
            self.failed = result.is_err();
            return Some(result);
        }
    }
}
