use std::collections::HashMap;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::{ArchiveBackend, ReadSeek};
use crate::config::ArchiveConfig;
use crate::config::Category;
use crate::error::StoreResult;
use crate::shard::{shard_index, Sharding};
use crate::store::ShardStore;
use crate::table::{HashTable, MemoryTable};

/// In-memory archive.
///
/// Intended for tests and embedding. Values are placed with the same path
/// resolution the store uses, so a [`ShardStore`] built from it finds them
/// exactly where it would on disk.
#[derive(Clone, Debug)]
pub struct MemoryArchive {
    config: ArchiveConfig,
    tables: HashMap<PathBuf, Arc<MemoryTable>>,
    files: HashMap<PathBuf, Vec<u8>>,
}

/// Read-only view of a [`MemoryArchive`] handed to the store.
struct MemoryBackend {
    tables: HashMap<PathBuf, Arc<MemoryTable>>,
    files: HashMap<PathBuf, Arc<[u8]>>,
}

impl MemoryArchive {
    pub fn new(config: ArchiveConfig) -> Self {
        Self {
            config,
            tables: HashMap::new(),
            files: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Store `value` under `key` in the shard `key` resolves to.
    pub fn put(
        &mut self,
        category: Category,
        key: &[u8],
        sharding: Sharding,
        value: impl Into<Vec<u8>>,
    ) -> StoreResult<()> {
        let layout = self.config.layout(category)?;
        let path = layout.path(shard_index(key, layout.prefix_bits, sharding));
        Arc::make_mut(self.tables.entry(path).or_default()).insert(key, value);
        Ok(())
    }

    /// Append `data` to a sequential shard, returning the offset it starts at.
    pub fn append(&mut self, category: Category, shard: u32, data: &[u8]) -> StoreResult<u64> {
        let path = self.config.layout(category)?.path(shard);
        let file = self.files.entry(path).or_default();
        let offset = file.len() as u64;
        file.extend_from_slice(data);
        Ok(offset)
    }

    /// Freeze the archive into a store.
    pub fn into_store(self) -> StoreResult<ShardStore> {
        let backend = MemoryBackend {
            tables: self.tables,
            files: self
                .files
                .into_iter()
                .map(|(path, data)| (path, Arc::from(data)))
                .collect(),
        };
        ShardStore::new(self.config, backend)
    }
}

impl ArchiveBackend for MemoryBackend {
    fn open_table(&self, path: &Path) -> StoreResult<Option<Arc<dyn HashTable>>> {
        Ok(self
            .tables
            .get(path)
            .map(|table| Arc::clone(table) as Arc<dyn HashTable>))
    }

    fn open_file(&self, path: &Path) -> StoreResult<Box<dyn ReadSeek>> {
        let data = self.files.get(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )
        })?;
        Ok(Box::new(Cursor::new(Arc::clone(data))))
    }
}
