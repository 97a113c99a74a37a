//! File-level diff between a commit and one of its parents.
//!
//! Paths present on both sides with different blobs are modifications. The
//! remaining additions are matched against deletions by content similarity
//! to detect renames.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};
use woc_objects::{Blob, Commit, GitObject};
use woc_store::ShardStore;
use woc_types::ObjectKey;

use crate::error::DiffResult;
use crate::similarity::is_similar;

/// Similarity a deleted and an added blob must exceed to count as a rename.
pub const DEFAULT_RENAME_THRESHOLD: f64 = 0.5;

/// How a path changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Deleted,
    Modified,
    Renamed,
}

/// One changed path. Absent sides are `None`: an addition has no old path
/// or key, a deletion no new ones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    pub old_key: Option<ObjectKey>,
    pub new_key: Option<ObjectKey>,
}

impl FileChange {
    pub fn added(path: impl Into<String>, key: ObjectKey) -> Self {
        Self {
            old_path: None,
            new_path: Some(path.into()),
            old_key: None,
            new_key: Some(key),
        }
    }

    pub fn deleted(path: impl Into<String>, key: ObjectKey) -> Self {
        Self {
            old_path: Some(path.into()),
            new_path: None,
            old_key: Some(key),
            new_key: None,
        }
    }

    pub fn modified(path: impl Into<String>, old_key: ObjectKey, new_key: ObjectKey) -> Self {
        let path = path.into();
        Self {
            old_path: Some(path.clone()),
            new_path: Some(path),
            old_key: Some(old_key),
            new_key: Some(new_key),
        }
    }

    pub fn renamed(
        old_path: impl Into<String>,
        old_key: ObjectKey,
        new_path: impl Into<String>,
        new_key: ObjectKey,
    ) -> Self {
        Self {
            old_path: Some(old_path.into()),
            new_path: Some(new_path.into()),
            old_key: Some(old_key),
            new_key: Some(new_key),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match (&self.old_path, &self.new_path) {
            (None, _) => ChangeKind::Added,
            (_, None) => ChangeKind::Deleted,
            (Some(old), Some(new)) if old == new => ChangeKind::Modified,
            _ => ChangeKind::Renamed,
        }
    }
}

/// Changes from `parent` to `child`.
///
/// `parent` is normally one of `child`'s parents; any other commit is
/// compared all the same, with a warning. A `threshold` of 1 or more turns
/// rename detection off.
pub fn diff_commits(child: &Commit, parent: &Commit, threshold: f64) -> DiffResult<Vec<FileChange>> {
    if !child.parent_keys()?.contains(&parent.key()) {
        warn!(
            child = %child.key(),
            parent = %parent.key(),
            "diffing commits that are not parent and child"
        );
    }
    let new_tree = child.tree()?;
    let old_tree = parent.tree()?;
    diff_files(child.store(), old_tree.files()?, new_tree.files()?, threshold)
}

/// Changes between two path → blob maps. Blob contents are read from
/// `store` only for rename detection.
pub fn diff_files(
    store: &Arc<ShardStore>,
    old: &BTreeMap<String, ObjectKey>,
    new: &BTreeMap<String, ObjectKey>,
    threshold: f64,
) -> DiffResult<Vec<FileChange>> {
    let mut changes = Vec::new();
    let mut added = Vec::new();
    for (path, &new_key) in new {
        match old.get(path) {
            Some(&old_key) if old_key != new_key => {
                changes.push(FileChange::modified(path, old_key, new_key));
            }
            Some(_) => {}
            None => added.push((path, new_key)),
        }
    }
    let mut deleted: Vec<(&String, ObjectKey)> = old
        .iter()
        .filter(|(path, _)| !new.contains_key(*path))
        .map(|(path, &key)| (path, key))
        .collect();

    if threshold >= 1.0 {
        changes.extend(added.into_iter().map(|(path, key)| FileChange::added(path, key)));
        changes.extend(deleted.into_iter().map(|(path, key)| FileChange::deleted(path, key)));
        return Ok(changes);
    }

    let mut contents = BlobContents::new(store);
    for (new_path, new_key) in added {
        let mut matched = None;
        if let Some(new_data) = contents.load(new_key)? {
            for (i, &(_, old_key)) in deleted.iter().enumerate() {
                let Some(old_data) = contents.load(old_key)? else {
                    continue;
                };
                if is_similar(&old_data, &new_data, threshold) {
                    matched = Some(i);
                    break;
                }
            }
        }
        match matched {
            Some(i) => {
                let (old_path, old_key) = deleted.remove(i);
                changes.push(FileChange::renamed(old_path, old_key, new_path, new_key));
            }
            None => changes.push(FileChange::added(new_path, new_key)),
        }
    }
    changes.extend(deleted.into_iter().map(|(path, key)| FileChange::deleted(path, key)));
    Ok(changes)
}

/// Blob contents read so far. A blob missing from the archive never
/// matches anything.
struct BlobContents<'a> {
    store: &'a Arc<ShardStore>,
    loaded: HashMap<ObjectKey, Option<Arc<[u8]>>>,
}

impl<'a> BlobContents<'a> {
    fn new(store: &'a Arc<ShardStore>) -> Self {
        Self {
            store,
            loaded: HashMap::new(),
        }
    }

    fn load(&mut self, key: ObjectKey) -> DiffResult<Option<Arc<[u8]>>> {
        if let Some(data) = self.loaded.get(&key) {
            return Ok(data.clone());
        }
        let blob = Blob::from_key(Arc::clone(self.store), key);
        let data = match blob.raw_content() {
            Ok(raw) => Some(Arc::from(raw)),
            Err(e) if e.is_not_found() => {
                debug!(blob = %key, "blob missing, excluded from rename detection");
                None
            }
            Err(e) => return Err(e.into()),
        };
        self.loaded.insert(key, data.clone());
        Ok(data)
    }
}
