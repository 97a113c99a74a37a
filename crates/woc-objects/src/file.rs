use std::fmt;
use std::sync::{Arc, OnceLock};

use woc_relations::{Relation, RelationIndex};
use woc_store::{Category, ShardStore};
use woc_types::ObjectKey;

use crate::commit::Commit;
use crate::error::{ObjectError, ObjectResult};
use crate::object::get_or_try_init;
use crate::registry::{authored_commits, RegistryNames};

/// A path as it appears in commit trees, across all repositories.
#[derive(Clone)]
pub struct File {
    store: Arc<ShardStore>,
    path: String,
    commit_keys: OnceLock<Vec<ObjectKey>>,
    author_names: OnceLock<Vec<String>>,
    blob_keys: OnceLock<Vec<ObjectKey>>,
}

impl File {
    pub fn new(store: Arc<ShardStore>, path: impl Into<String>) -> Self {
        Self {
            store,
            path: path.into(),
            commit_keys: OnceLock::new(),
            author_names: OnceLock::new(),
            blob_keys: OnceLock::new(),
        }
    }

    /// Every path in the archive.
    pub fn all(store: &Arc<ShardStore>) -> ObjectResult<impl Iterator<Item = ObjectResult<File>>> {
        let store = Arc::clone(store);
        Ok(RegistryNames::new(&store, Category::FileCommits)?
            .map(move |path| Ok(File::new(Arc::clone(&store), path?))))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn relations(&self) -> RelationIndex {
        RelationIndex::new(Arc::clone(&self.store))
    }

    /// Commits that changed the path.
    pub fn commit_keys(&self) -> ObjectResult<&[ObjectKey]> {
        get_or_try_init(&self.commit_keys, || {
            Ok::<_, ObjectError>(
                self.relations()
                    .fetch_keys(Relation::FileCommits, self.path.as_bytes())?,
            )
        })
        .map(Vec::as_slice)
    }

    pub fn commits(&self) -> ObjectResult<impl Iterator<Item = ObjectResult<Commit>> + '_> {
        Ok(authored_commits(&self.store, self.commit_keys()?))
    }

    pub fn author_names(&self) -> ObjectResult<&[String]> {
        get_or_try_init(&self.author_names, || {
            Ok::<_, ObjectError>(
                self.relations()
                    .fetch_identifiers(Relation::FileAuthors, self.path.as_bytes())?,
            )
        })
        .map(Vec::as_slice)
    }

    /// Every version of the file's contents.
    pub fn blob_keys(&self) -> ObjectResult<&[ObjectKey]> {
        get_or_try_init(&self.blob_keys, || {
            Ok::<_, ObjectError>(
                self.relations()
                    .fetch_keys(Relation::FileBlobs, self.path.as_bytes())?,
            )
        })
        .map(Vec::as_slice)
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File({})", self.path)
    }
}

impl PartialEq for File {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for File {}
