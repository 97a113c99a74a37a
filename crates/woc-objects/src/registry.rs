use std::sync::Arc;

use tracing::debug;
use woc_store::{Category, PrefixKeys, ShardStore};
use woc_types::ObjectKey;

use crate::commit::{Commit, MERGE_BUTTON_AUTHOR};
use crate::error::ObjectResult;
use crate::object::GitObject;

/// Every identifier stored in a registry category, shard by shard.
pub struct RegistryNames {
    store: Arc<ShardStore>,
    category: Category,
    next_shard: u64,
    shard_count: u64,
    keys: Option<PrefixKeys>,
}

impl RegistryNames {
    pub(crate) fn new(store: &Arc<ShardStore>, category: Category) -> ObjectResult<Self> {
        Ok(Self {
            store: Arc::clone(store),
            category,
            next_shard: 0,
            shard_count: store.shard_count(category)?,
            keys: None,
        })
    }
}

impl Iterator for RegistryNames {
    type Item = ObjectResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(keys) = self.keys.as_mut() {
                match keys.next() {
                    Some(Ok(key)) => return Some(Ok(String::from_utf8_lossy(&key).into_owned())),
                    Some(Err(e)) => {
                        self.keys = None;
                        return Some(Err(e.into()));
                    }
                    None => self.keys = None,
                }
            }
            if self.next_shard >= self.shard_count {
                return None;
            }
            let shard = self.next_shard as u32;
            self.next_shard += 1;
            match self.store.keys_with_prefix(self.category, shard, b"") {
                Ok(keys) => self.keys = Some(keys),
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

/// Commits for `keys`, skipping commits missing from the archive and those
/// made by the GitHub merge button.
pub(crate) fn authored_commits<'a>(
    store: &'a Arc<ShardStore>,
    keys: &'a [ObjectKey],
) -> impl Iterator<Item = ObjectResult<Commit>> + 'a {
    keys.iter().filter_map(move |key| {
        let commit = Commit::from_key(Arc::clone(store), *key);
        let automated = match commit.author() {
            Ok(author) => author == MERGE_BUTTON_AUTHOR,
            Err(e) if e.is_not_found() => {
                debug!(commit = %key, "skipping commit missing from the archive");
                return None;
            }
            Err(e) => return Some(Err(e)),
        };
        (!automated).then_some(Ok(commit))
    })
}
