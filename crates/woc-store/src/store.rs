use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::trace;

use crate::backend::{ArchiveBackend, DiskBackend};
use crate::config::{ArchiveConfig, Category, ShardLayout};
use crate::error::{StoreError, StoreResult};
use crate::pool::HandlePool;
use crate::sequential::SequentialRecords;
use crate::shard::{shard_index, Sharding};
use crate::table::HashTable;

/// Read-only access to a sharded archive.
///
/// Resolves `(category, key)` to a shard file through the injected
/// [`ArchiveConfig`] and reads it through an [`ArchiveBackend`], keeping a
/// bounded pool of open hash-table handles.
pub struct ShardStore {
    config: ArchiveConfig,
    backend: Box<dyn ArchiveBackend>,
    pool: HandlePool,
}

impl ShardStore {
    /// Create a store over any backend. The configuration is validated.
    pub fn new(config: ArchiveConfig, backend: impl ArchiveBackend + 'static) -> StoreResult<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.max_open_handles)
            .ok_or_else(|| StoreError::Config("max_open_handles must be at least 1".into()))?;
        Ok(Self {
            config,
            backend: Box::new(backend),
            pool: HandlePool::new(capacity),
        })
    }

    /// Create a store reading the archive from disk.
    pub fn open(config: ArchiveConfig) -> StoreResult<Self> {
        Self::new(config, DiskBackend)
    }

    /// The configuration the store was opened with.
    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Layout of a category; [`StoreError::UnconfiguredCategory`] if absent.
    pub fn layout(&self, category: Category) -> StoreResult<&ShardLayout> {
        self.config.layout(category)
    }

    /// Shard index `key` falls into.
    pub fn shard_of(&self, category: Category, key: &[u8], sharding: Sharding) -> StoreResult<u32> {
        let layout = self.layout(category)?;
        Ok(shard_index(key, layout.prefix_bits, sharding))
    }

    /// Path of the shard holding `key`.
    pub fn resolve_shard(
        &self,
        category: Category,
        key: &[u8],
        sharding: Sharding,
    ) -> StoreResult<PathBuf> {
        let layout = self.layout(category)?;
        Ok(layout.path(shard_index(key, layout.prefix_bits, sharding)))
    }

    /// Number of shards of a category.
    pub fn shard_count(&self, category: Category) -> StoreResult<u64> {
        Ok(self.layout(category)?.shard_count())
    }

    fn table(&self, path: &Path) -> StoreResult<Option<Arc<dyn HashTable>>> {
        self.pool
            .get_or_open(path, |path| self.backend.open_table(path))
    }

    /// Point lookup. A missing key or a missing shard file is `Ok(None)`.
    pub fn get(
        &self,
        category: Category,
        key: &[u8],
        sharding: Sharding,
    ) -> StoreResult<Option<Vec<u8>>> {
        let path = self.resolve_shard(category, key, sharding)?;
        trace!(%category, path = %path.display(), "lookup");
        match self.table(&path)? {
            Some(table) => table.get(key),
            None => Ok(None),
        }
    }

    /// Lookup of a git object's value by binary key; absence is
    /// [`StoreError::ObjectNotFound`].
    pub fn get_essential(&self, category: Category, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.get(category, key, Sharding::Prefix)?
            .ok_or_else(|| StoreError::not_found(category, key))
    }

    /// Keys of one shard starting with `prefix`, in storage order.
    ///
    /// The shard is walked lazily. A missing shard file yields nothing.
    pub fn keys_with_prefix(
        &self,
        category: Category,
        shard: u32,
        prefix: &[u8],
    ) -> StoreResult<PrefixKeys> {
        let path = self.layout(category)?.path(shard);
        Ok(PrefixKeys {
            table: self.table(&path)?,
            cursor: 0,
            prefix: prefix.to_vec(),
        })
    }

    /// Read `length` bytes at `offset` from the sequential shard `shard_key`
    /// resolves to.
    pub fn read_at(
        &self,
        category: Category,
        shard_key: &[u8],
        offset: u64,
        length: usize,
    ) -> StoreResult<Vec<u8>> {
        let path = self.resolve_shard(category, shard_key, Sharding::Prefix)?;
        trace!(%category, path = %path.display(), offset, length, "positioned read");
        let mut file = self.backend.open_file(&path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; length];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Buffered reader over one sequential shard.
    pub fn open_sequential(
        &self,
        category: Category,
        shard: u32,
    ) -> StoreResult<Box<dyn BufRead + Send>> {
        let path = self.layout(category)?.path(shard);
        Ok(Box::new(BufReader::new(self.backend.open_file(&path)?)))
    }

    /// Entries of one shard of a sequential store, paired with their
    /// compressed values.
    pub fn sequential_records(
        &self,
        index: Category,
        content: Category,
        shard: u32,
    ) -> StoreResult<SequentialRecords> {
        let index_path = self.layout(index)?.path(shard);
        Ok(SequentialRecords::new(
            index_path,
            self.open_sequential(index, shard)?,
            self.open_sequential(content, shard)?,
        ))
    }
}

/// Lazy iterator over keys of one shard that start with a prefix.
pub struct PrefixKeys {
    table: Option<Arc<dyn HashTable>>,
    cursor: u64,
    prefix: Vec<u8>,
}

impl Iterator for PrefixKeys {
    type Item = StoreResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let table = self.table.as_ref()?;
        loop {
            match table.next_key(self.cursor) {
                Ok(Some((key, next))) => {
                    self.cursor = next;
                    if key.starts_with(&self.prefix) {
                        return Some(Ok(key));
                    }
                }
                Ok(None) => {
                    self.table = None;
                    return None;
                }
                Err(e) => {
                    self.table = None;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryArchive;
    use crate::tch::fixture::TchBuilder;

    fn commit_key(first: u8) -> [u8; 20] {
        let mut key = [0x11u8; 20];
        key[0] = first;
        key
    }

    #[test]
    fn resolve_shard_uses_layout() {
        let store = MemoryArchive::new(ArchiveConfig::flat("/a", 3))
            .into_store()
            .unwrap();
        let path = store
            .resolve_shard(Category::CommitRandom, &commit_key(0x0D), Sharding::Prefix)
            .unwrap();
        assert_eq!(path, PathBuf::from("/a/commit_random_5.tch"));
        assert!(matches!(
            MemoryArchive::new(ArchiveConfig::default())
                .into_store()
                .unwrap()
                .resolve_shard(Category::CommitRandom, b"k", Sharding::Prefix),
            Err(StoreError::UnconfiguredCategory(Category::CommitRandom))
        ));
    }

    #[test]
    fn get_and_get_essential() {
        let mut archive = MemoryArchive::new(ArchiveConfig::flat("/a", 2));
        archive
            .put(Category::CommitRandom, &commit_key(1), Sharding::Prefix, "raw")
            .unwrap();
        archive
            .put(Category::AuthorCommits, b"Jane <j@x>", Sharding::Hashed, "list")
            .unwrap();
        let store = archive.into_store().unwrap();

        assert_eq!(
            store.get_essential(Category::CommitRandom, &commit_key(1)).unwrap(),
            b"raw"
        );
        assert!(matches!(
            store.get_essential(Category::CommitRandom, &commit_key(2)),
            Err(StoreError::ObjectNotFound { .. })
        ));
        assert_eq!(
            store
                .get(Category::AuthorCommits, b"Jane <j@x>", Sharding::Hashed)
                .unwrap(),
            Some(b"list".to_vec())
        );
        // Missing shard file for a relation category.
        assert_eq!(
            store
                .get(Category::FileBlobs, b"README.md", Sharding::Hashed)
                .unwrap(),
            None
        );
    }

    #[test]
    fn keys_with_prefix_filters_one_shard() {
        let config = ArchiveConfig::flat("/a", 0);
        let mut archive = MemoryArchive::new(config);
        for key in ["github.com_a_b", "gitlab.com_c_d", "github.com_e_f"] {
            archive
                .put(Category::ProjectCommits, key.as_bytes(), Sharding::Hashed, "")
                .unwrap();
        }
        let store = archive.into_store().unwrap();
        let keys: Vec<Vec<u8>> = store
            .keys_with_prefix(Category::ProjectCommits, 0, b"github.com_")
            .unwrap()
            .collect::<StoreResult<_>>()
            .unwrap();
        assert_eq!(keys, vec![b"github.com_a_b".to_vec(), b"github.com_e_f".to_vec()]);

        let none = store
            .keys_with_prefix(Category::AuthorFiles, 0, b"")
            .unwrap()
            .count();
        assert_eq!(none, 0);
    }

    #[test]
    fn read_at_and_open_sequential() {
        let mut archive = MemoryArchive::new(ArchiveConfig::flat("/a", 1));
        let key = commit_key(0x03);
        archive.append(Category::BlobData, 1, b"xxxxhello").unwrap();
        let store = archive.into_store().unwrap();

        assert_eq!(store.read_at(Category::BlobData, &key, 4, 5).unwrap(), b"hello");
        assert!(matches!(
            store.read_at(Category::BlobData, &key, 6, 10),
            Err(StoreError::Io(_))
        ));

        let mut all = String::new();
        store
            .open_sequential(Category::BlobData, 1)
            .unwrap()
            .read_to_string(&mut all)
            .unwrap();
        assert_eq!(all, "xxxxhello");
        assert!(store.open_sequential(Category::BlobData, 0).is_err());
    }

    #[test]
    fn disk_store_reads_tokyo_cabinet_shards() {
        let dir = tempfile::tempdir().unwrap();
        let config = ArchiveConfig::flat(dir.path(), 1).with_max_open_handles(1);
        let key_a = commit_key(0x00);
        let key_b = commit_key(0x01);
        let layout = config.layout(Category::TreeRandom).unwrap().clone();
        TchBuilder::new(11)
            .record(key_a, "tree a")
            .write(&layout.path(0))
            .unwrap();
        TchBuilder::new(11)
            .large()
            .record(key_b, "tree b")
            .write(&layout.path(1))
            .unwrap();

        let store = ShardStore::open(config).unwrap();
        // Alternate shards to force evictions with a single-handle pool.
        for _ in 0..3 {
            assert_eq!(store.get_essential(Category::TreeRandom, &key_a).unwrap(), b"tree a");
            assert_eq!(store.get_essential(Category::TreeRandom, &key_b).unwrap(), b"tree b");
        }
        assert_eq!(store.pool.len(), 1);
    }

    #[test]
    fn zero_handle_limit_is_rejected() {
        let config = ArchiveConfig::default().with_max_open_handles(0);
        assert!(matches!(ShardStore::open(config), Err(StoreError::Config(_))));
    }
}
