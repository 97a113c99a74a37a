//! Diff engine for the WoC archive.
//!
//! Compares the flattened trees of two commits and reports changed paths,
//! pairing deletions with similar additions as renames.
//!
//! # Key Types
//!
//! - [`FileChange`] / [`ChangeKind`] -- one changed path and its classification
//! - [`diff_commits`] -- changes between a commit and a parent

pub mod error;
pub mod similarity;
pub mod tree_diff;

pub use error::{DiffError, DiffResult};
pub use similarity::{is_similar, quick_ratio, ratio, real_quick_ratio};
pub use tree_diff::{diff_commits, diff_files, ChangeKind, FileChange, DEFAULT_RENAME_THRESHOLD};
