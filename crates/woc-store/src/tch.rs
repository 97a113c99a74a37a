//! Read-only access to Tokyo Cabinet hash database files.
//!
//! File layout:
//!
//! ```text
//! [0..256)        header: magic, alignment power, options, bucket count,
//!                 record count, file size, first record offset
//! [256..)         bucket array: u32 (u64 with the large option) per bucket,
//!                 little-endian, holding `offset >> apow` of the bucket's root
//! [first record)  records and free blocks, each aligned to 2^apow
//! ```
//!
//! A record is `0xC8, hash, left, right, padding (u16), ksiz, vsiz, key,
//! value, padding bytes`. Records sharing a bucket form a binary tree ordered
//! by the secondary hash byte, then by key length, then by key bytes.

use std::cmp::Ordering;
use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::table::HashTable;

const MAGIC: &[u8] = b"ToKyO CaBiNeT";
const HEADER_SIZE: usize = 256;

const APOW_OFFSET: usize = 34;
const OPTS_OFFSET: usize = 36;
const BNUM_OFFSET: usize = 40;
const RNUM_OFFSET: usize = 48;
const FSIZ_OFFSET: usize = 56;
const FREC_OFFSET: usize = 64;

const OPT_LARGE: u8 = 1 << 0;
/// Deflate, bzip2, TCBS and external codec options.
const OPT_COMPRESSED: u8 = (1 << 1) | (1 << 2) | (1 << 3) | (1 << 4);

const MAX_APOW: u8 = 16;

const RECORD_MAGIC: u8 = 0xC8;
const FREE_BLOCK_MAGIC: u8 = 0xB0;

/// A memory-mapped hash database opened read-only.
pub struct TchFile {
    path: PathBuf,
    map: Mmap,
    apow: u8,
    large: bool,
    bucket_count: u64,
    record_count: u64,
    first_record: u64,
    file_size: u64,
}

struct RecordHeader {
    hash: u8,
    left: u64,
    right: u64,
    key_start: usize,
    key_len: usize,
    value_len: usize,
    size: u64,
}

enum Block {
    Free { size: u64 },
    Record(RecordHeader),
}

impl TchFile {
    /// Map `path` and validate its header.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        // SAFETY: archive files are immutable once published and the map is
        // never written through.
        let map = unsafe { Mmap::map(&file)? };
        let table = Self::from_map(path, map)?;
        debug!(
            path = %table.path.display(),
            records = table.record_count,
            buckets = table.bucket_count,
            "opened hash table"
        );
        Ok(table)
    }

    fn from_map(path: PathBuf, map: Mmap) -> StoreResult<Self> {
        if map.len() < HEADER_SIZE || !map.starts_with(MAGIC) {
            return Err(StoreError::corrupt(path, "missing hash database magic"));
        }
        let opts = map[OPTS_OFFSET];
        if opts & OPT_COMPRESSED != 0 {
            return Err(StoreError::corrupt(path, "compressed records are not supported"));
        }
        let apow = map[APOW_OFFSET];
        if apow > MAX_APOW {
            return Err(StoreError::corrupt(path, format!("alignment power {apow} out of range")));
        }
        let large = opts & OPT_LARGE != 0;

        let header = |at| read_uint(&map, at, 8).unwrap_or(0);
        let bucket_count = header(BNUM_OFFSET);
        let record_count = header(RNUM_OFFSET);
        let file_size = header(FSIZ_OFFSET).min(map.len() as u64);
        let first_record = header(FREC_OFFSET);

        let width = if large { 8u64 } else { 4 };
        let buckets_end = bucket_count
            .checked_mul(width)
            .and_then(|n| n.checked_add(HEADER_SIZE as u64));
        match buckets_end {
            Some(end) if end <= map.len() as u64 => {}
            _ => return Err(StoreError::corrupt(path, "bucket array exceeds file")),
        }

        Ok(Self {
            path,
            map,
            apow,
            large,
            bucket_count,
            record_count,
            first_record,
            file_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn offset_width(&self) -> usize {
        if self.large {
            8
        } else {
            4
        }
    }

    fn corrupt(&self, reason: impl Into<String>) -> StoreError {
        StoreError::corrupt(&self.path, reason)
    }

    fn bucket_root(&self, index: u64) -> StoreResult<u64> {
        let width = self.offset_width();
        let at = usize::try_from(index)
            .ok()
            .and_then(|i| i.checked_mul(width))
            .and_then(|i| i.checked_add(HEADER_SIZE))
            .ok_or_else(|| self.corrupt("bucket index overflow"))?;
        let stored = read_uint(&self.map, at, width)
            .ok_or_else(|| self.corrupt(format!("bucket {index} past end of file")))?;
        Ok(stored << self.apow)
    }

    fn read_block(&self, offset: u64) -> StoreResult<Block> {
        let truncated = || self.corrupt(format!("truncated record at offset {offset}"));
        let at = usize::try_from(offset).map_err(|_| truncated())?;
        let bytes: &[u8] = &self.map;

        match *bytes.get(at).ok_or_else(truncated)? {
            FREE_BLOCK_MAGIC => {
                let size = read_uint(bytes, at + 1, 4).ok_or_else(truncated)?;
                Ok(Block::Free { size })
            }
            RECORD_MAGIC => {
                let width = self.offset_width();
                let mut pos = at + 1;
                let hash = *bytes.get(pos).ok_or_else(truncated)?;
                pos += 1;
                let left = read_uint(bytes, pos, width).ok_or_else(truncated)? << self.apow;
                pos += width;
                let right = read_uint(bytes, pos, width).ok_or_else(truncated)? << self.apow;
                pos += width;
                let padding = read_uint(bytes, pos, 2).ok_or_else(truncated)?;
                pos += 2;
                let (key_len, n) = read_varint(bytes.get(pos..).unwrap_or_default())
                    .ok_or_else(truncated)?;
                pos += n;
                let (value_len, n) = read_varint(bytes.get(pos..).unwrap_or_default())
                    .ok_or_else(truncated)?;
                pos += n;

                let key_len = usize::try_from(key_len).map_err(|_| truncated())?;
                let value_len = usize::try_from(value_len).map_err(|_| truncated())?;
                let end = pos
                    .checked_add(key_len)
                    .and_then(|n| n.checked_add(value_len))
                    .ok_or_else(truncated)?;
                if end > bytes.len() {
                    return Err(truncated());
                }
                Ok(Block::Record(RecordHeader {
                    hash,
                    left,
                    right,
                    key_start: pos,
                    key_len,
                    value_len,
                    size: (end - at) as u64 + padding,
                }))
            }
            other => Err(self.corrupt(format!(
                "unexpected block magic {other:#04x} at offset {offset}"
            ))),
        }
    }

    fn key_of(&self, rec: &RecordHeader) -> &[u8] {
        &self.map[rec.key_start..rec.key_start + rec.key_len]
    }

    fn value_of(&self, rec: &RecordHeader) -> &[u8] {
        let start = rec.key_start + rec.key_len;
        &self.map[start..start + rec.value_len]
    }
}

impl HashTable for TchFile {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        if self.bucket_count == 0 {
            return Ok(None);
        }
        let (bucket, hash) = bucket_of(key, self.bucket_count);
        let mut offset = self.bucket_root(bucket)?;
        let mut hops = 0u64;

        while offset > 0 {
            hops += 1;
            if hops > self.record_count.saturating_add(1) {
                return Err(self.corrupt(format!("cycle in bucket {bucket}")));
            }
            let rec = match self.read_block(offset)? {
                Block::Record(rec) => rec,
                Block::Free { .. } => {
                    return Err(self.corrupt(format!("bucket {bucket} links to a free block")))
                }
            };
            let next = match hash.cmp(&rec.hash) {
                Ordering::Greater => rec.left,
                Ordering::Less => rec.right,
                Ordering::Equal => match compare_keys(key, self.key_of(&rec)) {
                    Ordering::Greater => rec.left,
                    Ordering::Less => rec.right,
                    Ordering::Equal => return Ok(Some(self.value_of(&rec).to_vec())),
                },
            };
            offset = next;
        }
        Ok(None)
    }

    fn next_key(&self, cursor: u64) -> StoreResult<Option<(Vec<u8>, u64)>> {
        let mut offset = if cursor == 0 {
            self.first_record
        } else {
            cursor
        };
        while offset < self.file_size {
            match self.read_block(offset)? {
                Block::Free { size: 0 } => {
                    return Err(self.corrupt(format!("empty free block at offset {offset}")))
                }
                Block::Free { size } => offset += size,
                Block::Record(rec) => {
                    return Ok(Some((self.key_of(&rec).to_vec(), offset + rec.size)));
                }
            }
        }
        Ok(None)
    }

    fn len(&self) -> u64 {
        self.record_count
    }
}

/// Bucket index and secondary hash byte of a key.
fn bucket_of(key: &[u8], bucket_count: u64) -> (u64, u8) {
    let mut index: u64 = 19_780_211;
    let mut hash: u32 = 751;
    for (&forward, &backward) in key.iter().zip(key.iter().rev()) {
        index = index.wrapping_mul(37).wrapping_add(u64::from(forward));
        hash = hash.wrapping_mul(31) ^ u32::from(backward);
    }
    (index % bucket_count, hash as u8)
}

/// Shorter keys sort first; equal lengths compare bytewise.
fn compare_keys(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Little-endian unsigned integer of `width` bytes at `at`.
fn read_uint(bytes: &[u8], at: usize, width: usize) -> Option<u64> {
    let slice = bytes.get(at..at.checked_add(width)?)?;
    Some(slice.iter().rev().fold(0, |acc, &b| (acc << 8) | u64::from(b)))
}

/// Tokyo Cabinet's variable-length integer: little-endian base-128 where a
/// continuation byte `b` contributes `255 - b`.
fn read_varint(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut num: u64 = 0;
    let mut base: u64 = 1;
    for (i, &b) in bytes.iter().enumerate().take(10) {
        if b < 0x80 {
            num = num.checked_add(u64::from(b).checked_mul(base)?)?;
            return Some((num, i + 1));
        }
        num = num.checked_add(u64::from(255 - b).checked_mul(base)?)?;
        base = base.checked_shl(7)?;
    }
    None
}


#[cfg(test)]
mod tests {
    use super::fixture::{write_varint, TchBuilder};
    use super::*;
    use proptest::prelude::*;

    fn open_built(builder: &TchBuilder) -> (tempfile::TempDir, TchFile) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.tch");
        builder.write(&path).unwrap();
        let table = TchFile::open(&path).unwrap();
        (dir, table)
    }

    fn all_keys(table: &TchFile) -> Vec<Vec<u8>> {
        let mut keys = Vec::new();
        let mut cursor = 0;
        while let Some((key, next)) = table.next_key(cursor).unwrap() {
            keys.push(key);
            cursor = next;
        }
        keys
    }

    #[test]
    fn varint_known_encodings() {
        for (value, bytes) in [(0u64, vec![0u8]), (127, vec![127]), (128, vec![255, 1])] {
            let mut out = Vec::new();
            write_varint(&mut out, value);
            assert_eq!(out, bytes);
            assert_eq!(read_varint(&bytes), Some((value, bytes.len())));
        }
        assert_eq!(read_varint(&[0xFF]), None);
    }

    #[test]
    fn point_lookups() {
        let builder = TchBuilder::new(7)
            .record("alpha", "1")
            .record("beta", "two")
            .record("gamma", vec![0u8; 300]);
        let (_dir, table) = open_built(&builder);
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(b"alpha").unwrap(), Some(b"1".to_vec()));
        assert_eq!(table.get(b"beta").unwrap(), Some(b"two".to_vec()));
        assert_eq!(table.get(b"gamma").unwrap(), Some(vec![0u8; 300]));
        assert_eq!(table.get(b"delta").unwrap(), None);
    }

    #[test]
    fn single_bucket_tree_walk() {
        let mut builder = TchBuilder::new(1);
        for i in 0..64u32 {
            builder = builder.record(format!("key-{i}"), i.to_le_bytes());
        }
        let (_dir, table) = open_built(&builder);
        for i in 0..64u32 {
            let key = format!("key-{i}");
            assert_eq!(table.get(key.as_bytes()).unwrap(), Some(i.to_le_bytes().to_vec()));
        }
        assert_eq!(table.get(b"key-64").unwrap(), None);
    }

    #[test]
    fn large_offsets_and_alignment() {
        let builder = TchBuilder::new(3)
            .large()
            .apow(0)
            .record([0x01, 0x02], "binary key")
            .record("", "empty key");
        let (_dir, table) = open_built(&builder);
        assert_eq!(table.get(&[0x01, 0x02]).unwrap(), Some(b"binary key".to_vec()));
        assert_eq!(table.get(b"").unwrap(), Some(b"empty key".to_vec()));
    }

    #[test]
    fn enumeration_skips_free_blocks() {
        let builder = TchBuilder::new(5)
            .with_free_block()
            .record("p1", "")
            .record("p2", "")
            .record("q1", "");
        let (_dir, table) = open_built(&builder);
        assert_eq!(
            all_keys(&table),
            vec![b"p1".to_vec(), b"p2".to_vec(), b"q1".to_vec()]
        );
    }

    #[test]
    fn empty_database() {
        let (_dir, table) = open_built(&TchBuilder::new(0));
        assert!(table.is_empty());
        assert_eq!(table.get(b"anything").unwrap(), None);
        assert!(all_keys(&table).is_empty());
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.tch");
        std::fs::write(&path, vec![0u8; 512]).unwrap();
        assert!(matches!(
            TchFile::open(&path),
            Err(StoreError::CorruptTable { .. })
        ));
    }

    #[test]
    fn compressed_option_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deflate.tch");
        let mut bytes = TchBuilder::new(1).record("k", "v").build();
        bytes[OPTS_OFFSET] |= 1 << 1;
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(
            TchFile::open(&path),
            Err(StoreError::CorruptTable { .. })
        ));
    }

    #[test]
    fn truncated_record_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.tch");
        let mut bytes = TchBuilder::new(1).record("key", vec![7u8; 64]).build();
        bytes.truncate(bytes.len() - 40);
        std::fs::write(&path, bytes).unwrap();
        let table = TchFile::open(&path).unwrap();
        assert!(matches!(
            table.get(b"key"),
            Err(StoreError::CorruptTable { .. })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn every_written_key_is_found(
            entries in proptest::collection::btree_map(
                proptest::collection::vec(any::<u8>(), 0..24),
                proptest::collection::vec(any::<u8>(), 0..48),
                0..40,
            ),
            buckets in 1u64..17,
        ) {
            let mut builder = TchBuilder::new(buckets);
            for (k, v) in &entries {
                builder = builder.record(k, v);
            }
            let (_dir, table) = open_built(&builder);
            for (k, v) in &entries {
                prop_assert_eq!(table.get(k).unwrap(), Some(v.clone()));
            }
            prop_assert_eq!(all_keys(&table).len(), entries.len());
        }
    }
}
