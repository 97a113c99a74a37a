//! Git objects and identity entities of the WoC archive.
//!
//! Objects are cheap handles: [`GitObject::load`] validates a key and
//! nothing more. Content is fetched, decompressed and parsed on first
//! access and memoized per field, so a [`Commit`] touched only for its
//! projects never reads the commit store.
//!
//! # Key Types
//!
//! - [`Commit`], [`Tree`], [`Blob`], [`Tag`] -- the four git object types
//! - [`Project`], [`File`], [`Author`] -- identifiers linked to commits
//!   through precomputed relations
//! - [`ArchiveBuilder`] -- writes objects into an in-memory archive

pub mod author;
pub mod blob;
pub mod builder;
pub mod commit;
pub mod error;
pub mod file;
pub mod hashing;
pub mod kind;
pub mod object;
pub mod project;
pub mod registry;
pub mod sequential;
pub mod tag;
pub mod tree;
pub mod url;

pub use author::Author;
pub use blob::Blob;
pub use builder::{commit_body, ArchiveBuilder};
pub use commit::{Commit, CommitHeader, MERGE_BUTTON_AUTHOR};
pub use error::{ObjectError, ObjectResult};
pub use file::File;
pub use hashing::GitHasher;
pub use kind::ObjectKind;
pub use object::GitObject;
pub use project::Project;
pub use registry::RegistryNames;
pub use sequential::SequentialObjects;
pub use tag::Tag;
pub use tree::{display_name, encode_tree, parse_tree, FileMode, Traverse, Tree, TreeEntry, TreeItem, MAX_TREE_DEPTH};
pub use url::project_url;
