//! In-memory archives for tests and embedding.

use std::sync::Arc;

use woc_codec::{compress, pack_varints};
use woc_relations::{Encoding, Relation, RelationError};
use woc_store::{shard_index, ArchiveConfig, Category, MemoryArchive, ShardStore, Sharding, StoreError};
use woc_types::ObjectKey;

use crate::error::{ObjectError, ObjectResult};
use crate::hashing::GitHasher;
use crate::kind::ObjectKind;
use crate::tree::{encode_tree, TreeEntry};

/// Writes git objects and relations into a [`MemoryArchive`] in the
/// archive's own encodings.
pub struct ArchiveBuilder {
    archive: MemoryArchive,
    next_seq: u64,
}

impl Default for ArchiveBuilder {
    /// Every category under `/woc`, four shards each.
    fn default() -> Self {
        Self::new(ArchiveConfig::flat("/woc", 2))
    }
}

impl ArchiveBuilder {
    pub fn new(config: ArchiveConfig) -> Self {
        Self {
            archive: MemoryArchive::new(config),
            next_seq: 0,
        }
    }

    fn shard(&self, category: Category, key: &ObjectKey) -> ObjectResult<u32> {
        let layout = self.archive.config().layout(category)?;
        Ok(shard_index(key.as_bytes(), layout.prefix_bits, Sharding::Prefix))
    }

    /// Store `body` under `key` in the random-access store of `kind`. The key
    /// is not checked against the body.
    pub fn put_object(&mut self, kind: ObjectKind, key: ObjectKey, body: &[u8]) -> ObjectResult<()> {
        let category = match kind {
            ObjectKind::Commit => Category::CommitRandom,
            ObjectKind::Tree => Category::TreeRandom,
            ObjectKind::Blob => {
                let compressed = compress(body);
                let shard = self.shard(Category::BlobData, &key)?;
                let offset = self.archive.append(Category::BlobData, shard, &compressed)?;
                let position = pack_varints(&[offset, compressed.len() as u64]);
                self.archive
                    .put(Category::BlobOffset, key.as_bytes(), Sharding::Prefix, position)?;
                return Ok(());
            }
            ObjectKind::Tag => return Err(ObjectError::NoRandomAccess { kind, key }),
        };
        self.archive
            .put(category, key.as_bytes(), Sharding::Prefix, compress(body))?;
        Ok(())
    }

    fn add(&mut self, kind: ObjectKind, body: &[u8]) -> ObjectResult<ObjectKey> {
        let key = GitHasher::new(kind).hash(body);
        self.put_object(kind, key, body)?;
        Ok(key)
    }

    pub fn add_commit(&mut self, body: &str) -> ObjectResult<ObjectKey> {
        self.add(ObjectKind::Commit, body.as_bytes())
    }

    pub fn add_tree(&mut self, entries: &[TreeEntry]) -> ObjectResult<ObjectKey> {
        self.add(ObjectKind::Tree, &encode_tree(entries))
    }

    pub fn add_blob(&mut self, data: &[u8]) -> ObjectResult<ObjectKey> {
        self.add(ObjectKind::Blob, data)
    }

    /// Append a commit or tree to its sequential store only.
    pub fn add_sequential(&mut self, kind: ObjectKind, body: &[u8]) -> ObjectResult<ObjectKey> {
        let (index, content) = match kind {
            ObjectKind::Commit => (Category::CommitSequentialIdx, Category::CommitSequentialBin),
            ObjectKind::Tree => (Category::TreeSequentialIdx, Category::TreeSequentialBin),
            _ => {
                return Err(StoreError::Config(format!("no sequential store for {kind} objects")).into())
            }
        };
        let key = GitHasher::new(kind).hash(body);
        let shard = self.shard(index, &key)?;
        let compressed = compress(body);
        let offset = self.archive.append(content, shard, &compressed)?;
        let line = format!("{};{offset};{};{key}\n", self.next_seq, compressed.len());
        self.archive.append(index, shard, line.as_bytes())?;
        self.next_seq += 1;
        Ok(key)
    }

    /// Store a key-list relation value.
    pub fn add_keys(&mut self, relation: Relation, key: &[u8], members: &[ObjectKey]) -> ObjectResult<()> {
        check_encoding(relation, Encoding::Keys)?;
        let value: Vec<u8> = members.iter().flat_map(|k| *k.as_bytes()).collect();
        self.archive
            .put(relation.category(), key, relation.sharding(), value)?;
        Ok(())
    }

    /// Store an identifier-list relation value.
    pub fn add_identifiers(&mut self, relation: Relation, key: &[u8], names: &[&str]) -> ObjectResult<()> {
        check_encoding(relation, Encoding::Identifiers)?;
        let value = compress(names.join(";").as_bytes());
        self.archive
            .put(relation.category(), key, relation.sharding(), value)?;
        Ok(())
    }

    pub fn build(self) -> ObjectResult<Arc<ShardStore>> {
        Ok(Arc::new(self.archive.into_store()?))
    }
}

fn check_encoding(relation: Relation, expected: Encoding) -> ObjectResult<()> {
    if relation.encoding() == expected {
        Ok(())
    } else {
        Err(RelationError::WrongEncoding { relation, expected }.into())
    }
}

/// Body of a commit with matching author and committer lines.
pub fn commit_body(
    tree: &ObjectKey,
    parents: &[ObjectKey],
    author: &str,
    time: &str,
    message: &str,
) -> String {
    let mut body = format!("tree {tree}\n");
    for parent in parents {
        body.push_str(&format!("parent {parent}\n"));
    }
    body.push_str(&format!("author {author} {time}\ncommitter {author} {time}\n\n{message}\n"));
    body
}
