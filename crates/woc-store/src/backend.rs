use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::Arc;

use crate::error::StoreResult;
use crate::table::HashTable;
use crate::tch::TchFile;

/// A readable, seekable file handle.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Source of shard files.
///
/// The store resolves every lookup to a path and asks the backend to open
/// it. Backends never write.
pub trait ArchiveBackend: Send + Sync {
    /// Open a hash-table shard. `Ok(None)` when no file exists at `path`.
    fn open_table(&self, path: &Path) -> StoreResult<Option<Arc<dyn HashTable>>>;

    /// Open a sequential shard (content or index file).
    fn open_file(&self, path: &Path) -> StoreResult<Box<dyn ReadSeek>>;
}

/// Backend reading the archive from the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiskBackend;

impl ArchiveBackend for DiskBackend {
    fn open_table(&self, path: &Path) -> StoreResult<Option<Arc<dyn HashTable>>> {
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Arc::new(TchFile::open(path)?)))
    }

    fn open_file(&self, path: &Path) -> StoreResult<Box<dyn ReadSeek>> {
        Ok(Box::new(File::open(path)?))
    }
}
