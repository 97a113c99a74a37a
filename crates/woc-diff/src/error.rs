//! Error types for the diff crate.

use woc_objects::ObjectError;

/// Errors that can occur during diff operations.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// Loading a commit, tree or blob failed.
    #[error("object error: {0}")]
    Object(#[from] ObjectError),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
