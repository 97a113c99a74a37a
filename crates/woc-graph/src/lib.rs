//! Commit graph of a single WoC project.
//!
//! # Key Types
//!
//! - [`ProjectCommits`] -- loaded member commits with head, tail and
//!   first-parent history
//! - [`FirstParentChain`] -- lazy mainline walk, latest commit first

pub mod error;
pub mod graph;

pub use error::{GraphError, GraphResult};
pub use graph::{FirstParentChain, ProjectCommits};
