use std::fmt;
use std::sync::{Arc, OnceLock};

use woc_relations::{Relation, RelationIndex};
use woc_store::{Category, ShardStore};
use woc_types::ObjectKey;

use crate::commit::Commit;
use crate::error::{ObjectError, ObjectResult};
use crate::object::{get_or_try_init, GitObject};
use crate::registry::RegistryNames;

/// A commit author, identified as `Name <email>`.
#[derive(Clone)]
pub struct Author {
    store: Arc<ShardStore>,
    identity: String,
    commit_keys: OnceLock<Vec<ObjectKey>>,
    file_names: OnceLock<Vec<String>>,
    project_names: OnceLock<Vec<String>>,
}

impl Author {
    pub fn new(store: Arc<ShardStore>, identity: impl Into<String>) -> Self {
        Self {
            store,
            identity: identity.into(),
            commit_keys: OnceLock::new(),
            file_names: OnceLock::new(),
            project_names: OnceLock::new(),
        }
    }

    /// Every author in the archive.
    pub fn all(store: &Arc<ShardStore>) -> ObjectResult<impl Iterator<Item = ObjectResult<Author>>> {
        let store = Arc::clone(store);
        Ok(RegistryNames::new(&store, Category::AuthorCommits)?
            .map(move |identity| Ok(Author::new(Arc::clone(&store), identity?))))
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    fn relations(&self) -> RelationIndex {
        RelationIndex::new(Arc::clone(&self.store))
    }

    pub fn commit_keys(&self) -> ObjectResult<&[ObjectKey]> {
        get_or_try_init(&self.commit_keys, || {
            Ok::<_, ObjectError>(
                self.relations()
                    .fetch_keys(Relation::AuthorCommits, self.identity.as_bytes())?,
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

    pub fn file_names(&self) -> ObjectResult<&[String]> {
        get_or_try_init(&self.file_names, || {
            Ok::<_, ObjectError>(
                self.relations()
                    .fetch_identifiers(Relation::AuthorFiles, self.identity.as_bytes())?,
            )
        })
        .map(Vec::as_slice)
    }

    pub fn project_names(&self) -> ObjectResult<&[String]> {
        get_or_try_init(&self.project_names, || {
            Ok::<_, ObjectError>(
                self.relations()
                    .fetch_identifiers(Relation::AuthorProjects, self.identity.as_bytes())?,
            )
        })
        .map(Vec::as_slice)
    }
}

impl fmt::Debug for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Author({})", self.identity)
    }
}

impl PartialEq for Author {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for Author {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ArchiveBuilder;

    const JANE: &str = "Jane Doe <jane@example.com>";

    #[test]
    fn relations_of_an_author() {
        let mut b = ArchiveBuilder::default();
        let keys = [ObjectKey::from_hash([1; 20]), ObjectKey::from_hash([2; 20])];
        b.add_keys(Relation::AuthorCommits, JANE.as_bytes(), &keys).unwrap();
        b.add_identifiers(Relation::AuthorFiles, JANE.as_bytes(), &["a.py", "b.py"])
            .unwrap();
        b.add_identifiers(Relation::AuthorProjects, JANE.as_bytes(), &["jane_proj"])
            .unwrap();
        let store = b.build().unwrap();

        let author = Author::new(Arc::clone(&store), JANE);
        assert_eq!(author.commit_keys().unwrap(), &keys);
        // No filtering: author commits are listed even when absent.
        assert_eq!(author.commits().unwrap().count(), 2);
        assert_eq!(author.file_names().unwrap(), ["a.py", "b.py"]);
        assert_eq!(author.project_names().unwrap(), ["jane_proj"]);

        let nobody = Author::new(store, "Nobody <n@x>");
        assert!(nobody.commit_keys().unwrap().is_empty());
    }
}
