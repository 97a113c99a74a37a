use std::path::Path;
use std::sync::{Arc, OnceLock};

use woc_codec::decompress;
use woc_store::{Category, ShardStore};
use woc_types::ObjectKey;

use crate::error::ObjectResult;
use crate::hashing::GitHasher;
use crate::kind::ObjectKind;

/// A git object addressed by its key.
///
/// Construction validates the key and touches no storage; content is
/// fetched, decompressed and parsed on first access, then kept.
pub trait GitObject: Sized {
    const KIND: ObjectKind;

    /// Wrap a validated key.
    fn from_key(store: Arc<ShardStore>, key: ObjectKey) -> Self;

    /// The object's key.
    fn key(&self) -> ObjectKey;

    /// Decompressed object body, without git's type/length header.
    fn raw_content(&self) -> ObjectResult<&[u8]>;

    /// Wrap a key given as 20 raw bytes or 40 hex characters.
    fn load(store: &Arc<ShardStore>, key: impl AsRef<[u8]>) -> ObjectResult<Self> {
        let key = ObjectKey::from_input(key.as_ref())?;
        Ok(Self::from_key(Arc::clone(store), key))
    }

    /// Key git would give an object of this type with body `data`.
    fn string_key(data: &[u8]) -> ObjectKey {
        GitHasher::new(Self::KIND).hash(data)
    }

    /// Key git would give an object of this type with the file's contents.
    fn file_key(path: impl AsRef<Path>) -> ObjectResult<ObjectKey> {
        Ok(GitHasher::new(Self::KIND).hash_file(path)?)
    }
}

/// Fetch and decompress an object from a random-access category.
pub(crate) fn fetch_object(
    store: &ShardStore,
    category: Category,
    key: &ObjectKey,
) -> ObjectResult<Vec<u8>> {
    let stored = store.get_essential(category, key.as_bytes())?;
    Ok(decompress(&stored)?)
}

/// `OnceLock::get_or_init` for fallible initializers.
///
/// A failed initializer leaves the cell empty so the next access retries.
pub(crate) fn get_or_try_init<T, E>(
    cell: &OnceLock<T>,
    init: impl FnOnce() -> Result<T, E>,
) -> Result<&T, E> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = init()?;
    Ok(cell.get_or_init(|| value))
}

