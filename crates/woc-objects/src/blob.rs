use std::fmt;
use std::sync::{Arc, OnceLock};

use woc_codec::{decompress, unpack_varints};
use woc_relations::{Relation, RelationIndex};
use woc_store::{Category, ShardStore, Sharding};
use woc_types::ObjectKey;

use crate::commit::Commit;
use crate::error::{ObjectError, ObjectResult};
use crate::kind::ObjectKind;
use crate::object::{get_or_try_init, GitObject};

/// A file's contents, read from the blob data shards on first access.
#[derive(Clone)]
pub struct Blob {
    store: Arc<ShardStore>,
    key: ObjectKey,
    position: OnceLock<(u64, usize)>,
    raw: OnceLock<Vec<u8>>,
    commit_keys: OnceLock<Vec<ObjectKey>>,
    file_names: OnceLock<Vec<String>>,
}

impl GitObject for Blob {
    const KIND: ObjectKind = ObjectKind::Blob;

    fn from_key(store: Arc<ShardStore>, key: ObjectKey) -> Self {
        Self {
            store,
            key,
            position: OnceLock::new(),
            raw: OnceLock::new(),
            commit_keys: OnceLock::new(),
            file_names: OnceLock::new(),
        }
    }

    fn key(&self) -> ObjectKey {
        self.key
    }

    fn raw_content(&self) -> ObjectResult<&[u8]> {
        get_or_try_init(&self.raw, || {
            let (offset, length) = self.position()?;
            let stored = self
                .store
                .read_at(Category::BlobData, self.key.as_bytes(), offset, length)?;
            Ok::<_, ObjectError>(decompress(&stored)?)
        })
        .map(Vec::as_slice)
    }
}

impl Blob {
    /// Offset and compressed length of the blob in its data shard.
    ///
    /// The stored value must hold exactly two varints; anything else reads
    /// as a missing blob.
    pub fn position(&self) -> ObjectResult<(u64, usize)> {
        get_or_try_init(&self.position, || {
            let stored = self
                .store
                .get(Category::BlobOffset, self.key.as_bytes(), Sharding::Prefix)?
                .unwrap_or_default();
            match unpack_varints(&stored).as_slice() {
                [offset, length] => Ok((*offset, *length as usize)),
                _ => Err(ObjectError::ObjectNotFound(format!(
                    "blob data not found, bad key {}",
                    self.key
                ))),
            }
        })
        .copied()
    }

    /// Stored (compressed) length of the blob.
    pub fn len(&self) -> ObjectResult<usize> {
        Ok(self.position()?.1)
    }

    pub fn is_empty(&self) -> ObjectResult<bool> {
        Ok(self.len()? == 0)
    }

    fn relations(&self) -> RelationIndex {
        RelationIndex::new(Arc::clone(&self.store))
    }

    /// Commits that introduced or removed this blob.
    pub fn commit_keys(&self) -> ObjectResult<&[ObjectKey]> {
        get_or_try_init(&self.commit_keys, || {
            Ok::<_, ObjectError>(
                self.relations()
                    .fetch_keys(Relation::BlobCommits, self.key.as_bytes())?,
            )
        })
        .map(Vec::as_slice)
    }

    pub fn commits(&self) -> ObjectResult<impl Iterator<Item = Commit> + '_> {
        Ok(self
            .commit_keys()?
            .iter()
            .map(|key| Commit::from_key(Arc::clone(&self.store), *key)))
    }

    /// Paths the blob was stored under.
    pub fn file_names(&self) -> ObjectResult<&[String]> {
        get_or_try_init(&self.file_names, || {
            Ok::<_, ObjectError>(
                self.relations()
                    .fetch_identifiers(Relation::BlobFiles, self.key.as_bytes())?,
            )
        })
        .map(Vec::as_slice)
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob({})", self.key.short_hex())
    }
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Blob {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ArchiveBuilder;
    use woc_codec::pack_varints;
    use woc_store::{ArchiveConfig, MemoryArchive};

    #[test]
    fn reads_content_by_offset() {
        let mut b = ArchiveBuilder::default();
        let first = b.add_blob(b"Hello world!").unwrap();
        let body: Vec<u8> = b"line of text\n".repeat(40);
        let second = b.add_blob(&body).unwrap();
        let commit = ObjectKey::from_hash([3; 20]);
        b.add_keys(Relation::BlobCommits, second.as_bytes(), &[commit])
            .unwrap();
        b.add_identifiers(Relation::BlobFiles, second.as_bytes(), &["notes.txt", "EMPTY"])
            .unwrap();
        let store = b.build().unwrap();

        let hello = Blob::load(&store, "6769dd60bdf536a83c9353272157893043e9f7d0").unwrap();
        assert_eq!(hello.key(), first);
        assert_eq!(hello.raw_content().unwrap(), b"Hello world!");

        let blob = Blob::load(&store, second.as_bytes()).unwrap();
        assert_eq!(blob.raw_content().unwrap(), body.as_slice());
        assert!(blob.len().unwrap() < body.len());
        assert!(!blob.is_empty().unwrap());
        assert_eq!(blob.commit_keys().unwrap(), &[commit]);
        assert_eq!(blob.commits().unwrap().next().unwrap().key(), commit);
        assert_eq!(blob.file_names().unwrap(), ["notes.txt"]);
    }

    #[test]
    fn unknown_blob_is_not_found() {
        let store = ArchiveBuilder::default().build().unwrap();
        let blob = Blob::load(&store, [0xAB; 20]).unwrap();
        assert!(matches!(
            blob.raw_content(),
            Err(ObjectError::ObjectNotFound(msg)) if msg.contains("bad key")
        ));
        assert!(blob.file_names().unwrap().is_empty());
    }

    #[test]
    fn position_needs_exactly_two_varints() {
        let key = ObjectKey::from_hash([0x01; 20]);
        let mut archive = MemoryArchive::new(ArchiveConfig::flat("/woc", 2));
        archive.append(Category::BlobData, 1, b"abc").unwrap();
        archive
            .put(Category::BlobOffset, key.as_bytes(), Sharding::Prefix, pack_varints(&[0, 3, 7]))
            .unwrap();
        let store = Arc::new(archive.into_store().unwrap());
        let blob = Blob::from_key(store, key);
        assert!(blob.position().unwrap_err().is_not_found());
    }

    #[test]
    fn string_key_matches_git() {
        assert_eq!(
            Blob::string_key(b"Hello world!").to_hex(),
            "6769dd60bdf536a83c9353272157893043e9f7d0"
        );
    }
}
