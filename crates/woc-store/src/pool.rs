use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;
use tracing::debug;

use crate::error::StoreResult;
use crate::table::HashTable;

/// Bounded cache of open hash-table handles keyed by path.
///
/// Handles are shared through `Arc`, so evicting one never invalidates a
/// lookup still holding it; the file closes when the last user drops it.
pub struct HandlePool {
    handles: Mutex<LruCache<PathBuf, Arc<dyn HashTable>>>,
}

impl HandlePool {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            handles: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Return the cached handle for `path`, or open and cache it.
    ///
    /// `open` returning `Ok(None)` (no such shard) is not cached.
    pub fn get_or_open<F>(&self, path: &Path, open: F) -> StoreResult<Option<Arc<dyn HashTable>>>
    where
        F: FnOnce(&Path) -> StoreResult<Option<Arc<dyn HashTable>>>,
    {
        if let Some(handle) = self.lock().get(path) {
            return Ok(Some(Arc::clone(handle)));
        }

        // Opened outside the lock; a concurrent opener of the same path
        // simply replaces the entry.
        let Some(handle) = open(path)? else {
            return Ok(None);
        };
        debug!(path = %path.display(), "opened shard");
        if let Some((evicted, _)) = self.lock().push(path.to_path_buf(), Arc::clone(&handle)) {
            if evicted != path {
                debug!(path = %evicted.display(), "evicted shard handle");
            }
        }
        Ok(Some(handle))
    }

    /// Number of handles currently cached.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<PathBuf, Arc<dyn HashTable>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::MemoryTable;
    use std::cell::Cell;

    fn table_with(key: &str) -> Arc<dyn HashTable> {
        let mut t = MemoryTable::new();
        t.insert(key.as_bytes(), "v");
        Arc::new(t)
    }

    #[test]
    fn reuses_open_handles() {
        let pool = HandlePool::new(NonZeroUsize::new(4).unwrap());
        let opens = Cell::new(0);
        for _ in 0..3 {
            let handle = pool
                .get_or_open(Path::new("/a.tch"), |_| {
                    opens.set(opens.get() + 1);
                    Ok(Some(table_with("a")))
                })
                .unwrap()
                .unwrap();
            assert!(handle.get(b"a").unwrap().is_some());
        }
        assert_eq!(opens.get(), 1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn evicts_least_recently_used() {
        let pool = HandlePool::new(NonZeroUsize::new(2).unwrap());
        let open = |_: &Path| Ok(Some(table_with("x")));
        let held = pool.get_or_open(Path::new("/1.tch"), open).unwrap().unwrap();
        pool.get_or_open(Path::new("/2.tch"), open).unwrap();
        pool.get_or_open(Path::new("/3.tch"), open).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.capacity(), 2);
        // The evicted handle stays usable for whoever still holds it.
        assert!(held.get(b"x").unwrap().is_some());

        let reopened = Cell::new(false);
        pool.get_or_open(Path::new("/1.tch"), |_| {
            reopened.set(true);
            Ok(Some(table_with("x")))
        })
        .unwrap();
        assert!(reopened.get());
    }

    #[test]
    fn missing_shards_are_not_cached() {
        let pool = HandlePool::new(NonZeroUsize::new(2).unwrap());
        let opened = pool.get_or_open(Path::new("/none.tch"), |_| Ok(None)).unwrap();
        assert!(opened.is_none());
        assert!(pool.is_empty());
    }
}
