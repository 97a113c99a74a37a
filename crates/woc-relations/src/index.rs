use std::sync::Arc;

use tracing::debug;
use woc_store::{ShardStore, StoreError};
use woc_types::ObjectKey;

use crate::error::{RelationError, RelationResult};
use crate::relation::{decode_identifiers, decode_keys, decode_relation, Encoding, Relation};

/// Resolves relations against a [`ShardStore`].
///
/// Relation data is optional: a key the archive has no edges for, a missing
/// shard file and an unconfigured relation category all read as empty.
#[derive(Clone)]
pub struct RelationIndex {
    store: Arc<ShardStore>,
}

impl RelationIndex {
    pub fn new(store: Arc<ShardStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<ShardStore> {
        &self.store
    }

    /// The raw stored value, if any.
    pub fn fetch_raw(&self, relation: Relation, key: &[u8]) -> RelationResult<Option<Vec<u8>>> {
        match self
            .store
            .get(relation.category(), key, relation.sharding())
        {
            Ok(value) => Ok(value),
            Err(StoreError::UnconfiguredCategory(category)) => {
                debug!(%category, "relation category not configured, reading as empty");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The relation decoded to strings: identifiers, or keys as hex.
    pub fn fetch(&self, relation: Relation, key: &[u8]) -> RelationResult<Vec<String>> {
        let raw = self.fetch_raw(relation, key)?;
        decode_relation(raw.as_deref(), relation.encoding())
    }

    /// An identifier relation such as commit → projects.
    pub fn fetch_identifiers(&self, relation: Relation, key: &[u8]) -> RelationResult<Vec<String>> {
        expect_encoding(relation, Encoding::Identifiers)?;
        let raw = self.fetch_raw(relation, key)?;
        decode_identifiers(raw.as_deref())
    }

    /// A key relation such as project → commits.
    pub fn fetch_keys(&self, relation: Relation, key: &[u8]) -> RelationResult<Vec<ObjectKey>> {
        expect_encoding(relation, Encoding::Keys)?;
        let raw = self.fetch_raw(relation, key)?;
        Ok(decode_keys(raw.as_deref()))
    }
}

fn expect_encoding(relation: Relation, expected: Encoding) -> RelationResult<()> {
    if relation.encoding() == expected {
        Ok(())
    } else {
        Err(RelationError::WrongEncoding { relation, expected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use woc_codec::compress;
    use woc_store::{ArchiveConfig, Category, MemoryArchive, ShardLayout, Sharding};

    fn key(byte: u8) -> ObjectKey {
        ObjectKey::from_hash([byte; 20])
    }

    fn index() -> RelationIndex {
        let mut archive = MemoryArchive::new(ArchiveConfig::flat("/rel", 3));
        let mut members = Vec::new();
        members.extend_from_slice(key(1).as_bytes());
        members.extend_from_slice(key(2).as_bytes());
        archive
            .put(Category::ProjectCommits, b"user2589_minicms", Sharding::Hashed, members)
            .unwrap();
        archive
            .put(
                Category::CommitProjects,
                key(1).as_bytes(),
                Sharding::Prefix,
                compress(b"user2589_minicms;EMPTY"),
            )
            .unwrap();
        RelationIndex::new(Arc::new(archive.into_store().unwrap()))
    }

    #[test]
    fn fetches_keys_and_identifiers() {
        let idx = index();
        assert_eq!(
            idx.fetch_keys(Relation::ProjectCommits, b"user2589_minicms").unwrap(),
            vec![key(1), key(2)]
        );
        assert_eq!(
            idx.fetch_identifiers(Relation::CommitProjects, key(1).as_bytes())
                .unwrap(),
            vec!["user2589_minicms"]
        );
        assert_eq!(
            idx.fetch(Relation::ProjectCommits, b"user2589_minicms").unwrap()[0],
            key(1).to_hex()
        );
    }

    #[test]
    fn missing_edges_are_empty() {
        let idx = index();
        assert!(idx
            .fetch_keys(Relation::ProjectCommits, b"nobody_nothing")
            .unwrap()
            .is_empty());
        assert!(idx
            .fetch_identifiers(Relation::CommitProjects, key(9).as_bytes())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn unconfigured_relation_is_empty() {
        let config = ArchiveConfig::default()
            .with_layout(Category::CommitRandom, ShardLayout::new("/c_{key}.tch", 1));
        let store = MemoryArchive::new(config).into_store().unwrap();
        let idx = RelationIndex::new(Arc::new(store));
        assert!(idx
            .fetch_keys(Relation::AuthorCommits, b"Jane <j@x.com>")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn wrong_encoding_is_rejected() {
        let idx = index();
        assert!(matches!(
            idx.fetch_keys(Relation::CommitProjects, key(1).as_bytes()),
            Err(RelationError::WrongEncoding { .. })
        ));
    }
}
