use std::io;
use std::sync::Arc;

use tracing::debug;
use woc_codec::decompress;
use woc_store::{Category, SequentialRecords, ShardStore, StoreError};
use woc_types::ObjectKey;

use crate::error::ObjectResult;

type Assemble<T> = fn(Arc<ShardStore>, ObjectKey, Vec<u8>) -> T;

/// Objects of a sequential store, shard by shard, each with its content
/// already loaded.
///
/// Shards whose files are absent are skipped. A broken index or a short
/// content file ends its shard with an error; a value that fails to
/// decompress is reported and iteration continues.
pub struct SequentialObjects<T> {
    store: Arc<ShardStore>,
    index: Category,
    content: Category,
    next_shard: u64,
    shard_count: u64,
    records: Option<SequentialRecords>,
    assemble: Assemble<T>,
}

impl<T> SequentialObjects<T> {
    pub(crate) fn new(
        store: &Arc<ShardStore>,
        index: Category,
        content: Category,
        assemble: Assemble<T>,
    ) -> ObjectResult<Self> {
        Ok(Self {
            store: Arc::clone(store),
            index,
            content,
            next_shard: 0,
            shard_count: store.shard_count(index)?,
            records: None,
            assemble,
        })
    }

    fn open_next_shard(&mut self) -> Option<ObjectResult<()>> {
        while self.next_shard < self.shard_count {
            let shard = self.next_shard as u32;
            self.next_shard += 1;
            match self.store.sequential_records(self.index, self.content, shard) {
                Ok(records) => {
                    self.records = Some(records);
                    return Some(Ok(()));
                }
                Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(category = %self.index, shard, "sequential shard absent, skipping");
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }
}

impl<T> Iterator for SequentialObjects<T> {
    type Item = ObjectResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(records) = self.records.as_mut() {
                match records.next() {
                    Some(Ok((entry, compressed))) => {
                        return Some(match decompress(&compressed) {
                            Ok(raw) => Ok((self.assemble)(Arc::clone(&self.store), entry.key, raw)),
                            Err(e) => Err(e.into()),
                        });
                    }
                    Some(Err(e)) => {
                        self.records = None;
                        return Some(Err(e.into()));
                    }
                    None => self.records = None,
                }
            }
            if let Err(e) = self.open_next_shard()? {
                return Some(Err(e));
            }
        }
    }
}
