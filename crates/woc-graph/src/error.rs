//! Error types for the project graph.

use woc_objects::ObjectError;

/// Errors that can occur while building or walking a project graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A member commit could not be read or parsed.
    #[error("object error: {0}")]
    Object(#[from] ObjectError),
}

/// Convenience alias for graph results.
pub type GraphResult<T> = Result<T, GraphError>;
