use std::fmt;
use std::sync::{Arc, OnceLock};

use woc_relations::{Relation, RelationIndex};
use woc_store::{Category, ShardStore};
use woc_types::ObjectKey;

use crate::commit::Commit;
use crate::error::{ObjectError, ObjectResult};
use crate::object::get_or_try_init;
use crate::registry::{authored_commits, RegistryNames};
use crate::url::project_url;

/// A repository, named by its URI such as `user2589_minicms`.
#[derive(Clone)]
pub struct Project {
    store: Arc<ShardStore>,
    uri: String,
    commit_keys: OnceLock<Vec<ObjectKey>>,
    author_names: OnceLock<Vec<String>>,
}

impl Project {
    pub fn new(store: Arc<ShardStore>, uri: impl Into<String>) -> Self {
        Self {
            store,
            uri: uri.into(),
            commit_keys: OnceLock::new(),
            author_names: OnceLock::new(),
        }
    }

    /// Every project in the archive.
    pub fn all(store: &Arc<ShardStore>) -> ObjectResult<impl Iterator<Item = ObjectResult<Project>>> {
        let store = Arc::clone(store);
        Ok(RegistryNames::new(&store, Category::ProjectCommits)?
            .map(move |uri| Ok(Project::new(Arc::clone(&store), uri?))))
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn store(&self) -> &Arc<ShardStore> {
        &self.store
    }

    /// Web URL of the repository.
    pub fn url(&self) -> String {
        project_url(&self.uri)
    }

    fn relations(&self) -> RelationIndex {
        RelationIndex::new(Arc::clone(&self.store))
    }

    pub fn commit_keys(&self) -> ObjectResult<&[ObjectKey]> {
        get_or_try_init(&self.commit_keys, || {
            Ok::<_, ObjectError>(
                self.relations()
                    .fetch_keys(Relation::ProjectCommits, self.uri.as_bytes())?,
            )
        })
        .map(Vec::as_slice)
    }

    /// Member commits present in the archive, excluding automated merges.
    pub fn commits(&self) -> ObjectResult<impl Iterator<Item = ObjectResult<Commit>> + '_> {
        Ok(authored_commits(&self.store, self.commit_keys()?))
    }

    /// Whether the commit belongs to the project. A malformed key is simply
    /// not a member.
    pub fn contains(&self, key: impl AsRef<[u8]>) -> ObjectResult<bool> {
        match ObjectKey::from_input(key.as_ref()) {
            Ok(key) => Ok(self.commit_keys()?.contains(&key)),
            Err(_) => Ok(false),
        }
    }

    pub fn author_names(&self) -> ObjectResult<&[String]> {
        get_or_try_init(&self.author_names, || {
            Ok::<_, ObjectError>(
                self.relations()
                    .fetch_identifiers(Relation::ProjectAuthors, self.uri.as_bytes())?,
            )
        })
        .map(Vec::as_slice)
    }
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Project({})", self.uri)
    }
}

impl PartialEq for Project {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for Project {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{commit_body, ArchiveBuilder};
    use crate::commit::MERGE_BUTTON_AUTHOR;
    use crate::tree::{FileMode, TreeEntry};
    use crate::object::GitObject;

    #[test]
    fn commits_skip_missing_and_merge_button() {
        let mut b = ArchiveBuilder::default();
        let blob = b.add_blob(b"x").unwrap();
        let tree = b.add_tree(&[TreeEntry::new(FileMode::Regular, "x", blob)]).unwrap();
        let human = b
            .add_commit(&commit_body(&tree, &[], "Jane <j@x.com>", "1500000000 +0000", "a"))
            .unwrap();
        let bot = b
            .add_commit(&commit_body(&tree, &[human], MERGE_BUTTON_AUTHOR, "1500000100 +0000", "b"))
            .unwrap();
        let missing = ObjectKey::from_hash([0xEE; 20]);
        b.add_keys(Relation::ProjectCommits, b"user2589_minicms", &[human, bot, missing])
            .unwrap();
        b.add_identifiers(Relation::ProjectAuthors, b"user2589_minicms", &["Jane <j@x.com>"])
            .unwrap();
        let store = b.build().unwrap();

        let project = Project::new(Arc::clone(&store), "user2589_minicms");
        assert_eq!(project.commit_keys().unwrap().len(), 3);
        let commits: Vec<Commit> = project
            .commits()
            .unwrap()
            .collect::<ObjectResult<_>>()
            .unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].key(), human);
        assert!(project.contains(human.to_hex()).unwrap());
        assert!(project.contains(missing.as_bytes()).unwrap());
        assert!(!project.contains("zzz").unwrap());
        assert_eq!(project.author_names().unwrap(), ["Jane <j@x.com>"]);
        assert_eq!(project.url(), "https://github.com/user2589/minicms");
    }

    #[test]
    fn all_lists_every_shard() {
        let mut b = ArchiveBuilder::default();
        let names = ["a_b", "c_d", "gitlab.com_e_f", "user2589_minicms", "x_y"];
        for name in names {
            b.add_keys(Relation::ProjectCommits, name.as_bytes(), &[]).unwrap();
        }
        let store = b.build().unwrap();
        let mut found: Vec<String> = Project::all(&store)
            .unwrap()
            .map(|p| p.unwrap().uri().to_string())
            .collect();
        found.sort();
        assert_eq!(found, names);
    }
}
