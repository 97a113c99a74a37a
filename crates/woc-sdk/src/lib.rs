//! High-level SDK for the WoC archive.
//!
//! [`Archive`] is the entry point for applications: it opens the sharded
//! store from an [`ArchiveConfig`] and hands out commits, trees, blobs,
//! projects, diffs and project graphs. The [`timeline`] module builds
//! queries for the separate analytics store.

pub mod archive;
pub mod error;
pub mod timeline;

pub use archive::Archive;
pub use error::{SdkError, SdkResult};
pub use timeline::{
    AnalyticsStore, CommitTimeline, ProjectTimeline, Row, TimeBound, TimeRange, TimelineEntry,
};

// Re-export key types
pub use woc_diff::{ChangeKind, FileChange, DEFAULT_RENAME_THRESHOLD};
pub use woc_graph::{FirstParentChain, ProjectCommits};
pub use woc_objects::{
    Author, Blob, Commit, CommitHeader, File, FileMode, GitObject, ObjectKind, Project, Tag, Tree,
    TreeEntry,
};
pub use woc_relations::{Relation, RelationIndex};
pub use woc_store::{ArchiveConfig, Category, ShardLayout};
pub use woc_types::{CommitTime, ObjectKey};
