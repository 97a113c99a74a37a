use std::path::Path;
use std::sync::Arc;

use tracing::info;
use woc_diff::{diff_commits, FileChange, DEFAULT_RENAME_THRESHOLD};
use woc_graph::ProjectCommits;
use woc_objects::{Author, Blob, Commit, File, GitObject, Project, SequentialObjects, Tag, Tree};
use woc_relations::RelationIndex;
use woc_store::{ArchiveBackend, ArchiveConfig, ShardStore};

use crate::error::SdkResult;

/// Read-only handle on a WoC archive.
///
/// Cheap to clone; every object it hands out shares the same store and
/// handle pool.
#[derive(Clone)]
pub struct Archive {
    store: Arc<ShardStore>,
}

impl Archive {
    /// Open an archive on disk.
    pub fn open(config: ArchiveConfig) -> SdkResult<Self> {
        info!(
            categories = config.categories.len(),
            max_open_handles = config.max_open_handles,
            "opening archive"
        );
        Ok(Self::from_store(ShardStore::open(config)?))
    }

    /// Open an archive described by a TOML configuration file.
    pub fn open_config_file(path: impl AsRef<Path>) -> SdkResult<Self> {
        Self::open(ArchiveConfig::load(path)?)
    }

    /// Open an archive through any backend.
    pub fn with_backend(config: ArchiveConfig, backend: impl ArchiveBackend + 'static) -> SdkResult<Self> {
        Ok(Self::from_store(ShardStore::new(config, backend)?))
    }

    pub fn from_store(store: ShardStore) -> Self {
        Self::from_shared(Arc::new(store))
    }

    pub fn from_shared(store: Arc<ShardStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<ShardStore> {
        &self.store
    }

    pub fn relations(&self) -> RelationIndex {
        RelationIndex::new(Arc::clone(&self.store))
    }

    // ---- Git objects ----

    /// Key as 20 raw bytes or 40 hex characters.
    pub fn commit(&self, key: impl AsRef<[u8]>) -> SdkResult<Commit> {
        Ok(Commit::load(&self.store, key)?)
    }

    pub fn tree(&self, key: impl AsRef<[u8]>) -> SdkResult<Tree> {
        Ok(Tree::load(&self.store, key)?)
    }

    pub fn blob(&self, key: impl AsRef<[u8]>) -> SdkResult<Blob> {
        Ok(Blob::load(&self.store, key)?)
    }

    pub fn tag(&self, key: impl AsRef<[u8]>) -> SdkResult<Tag> {
        Ok(Tag::load(&self.store, key)?)
    }

    /// Every commit in the sequential commit store.
    pub fn commits(&self) -> SdkResult<SequentialObjects<Commit>> {
        Ok(Commit::all(&self.store)?)
    }

    /// Every tree in the sequential tree store.
    pub fn trees(&self) -> SdkResult<SequentialObjects<Tree>> {
        Ok(Tree::all(&self.store)?)
    }

    // ---- Identities ----

    pub fn project(&self, uri: impl Into<String>) -> Project {
        Project::new(Arc::clone(&self.store), uri)
    }

    pub fn file(&self, path: impl Into<String>) -> File {
        File::new(Arc::clone(&self.store), path)
    }

    pub fn author(&self, identity: impl Into<String>) -> Author {
        Author::new(Arc::clone(&self.store), identity)
    }

    // ---- Derived views ----

    /// Commit graph of one project.
    pub fn project_commits(&self, uri: impl Into<String>) -> SdkResult<ProjectCommits> {
        Ok(ProjectCommits::load(&self.project(uri))?)
    }

    /// Files changed from `parent` to `child`, with default rename detection.
    pub fn diff(&self, child: &Commit, parent: &Commit) -> SdkResult<Vec<FileChange>> {
        self.diff_with_threshold(child, parent, DEFAULT_RENAME_THRESHOLD)
    }

    pub fn diff_with_threshold(
        &self,
        child: &Commit,
        parent: &Commit,
        threshold: f64,
    ) -> SdkResult<Vec<FileChange>> {
        Ok(diff_commits(child, parent, threshold)?)
    }

    /// Changes a commit made relative to its first parent. A root commit
    /// adds every file.
    pub fn first_parent_diff(&self, commit: &Commit) -> SdkResult<Vec<FileChange>> {
        match commit.parent_keys()?.first() {
            Some(parent) => {
                let parent = Commit::from_key(Arc::clone(&self.store), *parent);
                self.diff(commit, &parent)
            }
            None => Ok(commit
                .tree()?
                .files()?
                .iter()
                .map(|(path, key)| FileChange::added(path, *key))
                .collect()),
        }
    }
}
