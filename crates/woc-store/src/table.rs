use std::collections::HashMap;

use crate::error::StoreResult;

/// Read-only key/value table backing one shard of a hash-table category.
///
/// Implementations must be safe to share between threads: the handle pool
/// hands the same table to concurrent lookups.
pub trait HashTable: Send + Sync {
    /// Point lookup. `Ok(None)` when the key is absent.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// The key of the first record at or after `cursor`, with the cursor of
    /// the record after it.
    ///
    /// Cursor `0` starts at the first record. Records come back in storage
    /// order; `Ok(None)` marks the end.
    fn next_key(&self, cursor: u64) -> StoreResult<Option<(Vec<u8>, u64)>>;

    /// Number of records.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory table preserving insertion order.
#[derive(Clone, Debug, Default)]
pub struct MemoryTable {
    records: Vec<(Vec<u8>, Vec<u8>)>,
    index: HashMap<Vec<u8>, usize>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value. A replaced key keeps its position.
    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        let key = key.into();
        let value = value.into();
        match self.index.get(&key) {
            Some(&pos) => self.records[pos].1 = value,
            None => {
                self.index.insert(key.clone(), self.records.len());
                self.records.push((key, value));
            }
        }
    }
}

impl HashTable for MemoryTable {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .index
            .get(key)
            .map(|&pos| self.records[pos].1.clone()))
    }

    fn next_key(&self, cursor: u64) -> StoreResult<Option<(Vec<u8>, u64)>> {
        let Ok(pos) = usize::try_from(cursor) else {
            return Ok(None);
        };
        Ok(self
            .records
            .get(pos)
            .map(|(key, _)| (key.clone(), cursor + 1)))
    }

    fn len(&self) -> u64 {
        self.records.len() as u64
    }
}
