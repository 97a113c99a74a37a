use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("unexpected analytics result: {0}")]
    UnexpectedRow(String),

    #[error("analytics query failed: {0}")]
    Analytics(String),

    #[error("store error: {0}")]
    Store(#[from] woc_store::StoreError),

    #[error("object error: {0}")]
    Object(#[from] woc_objects::ObjectError),

    #[error("diff error: {0}")]
    Diff(#[from] woc_diff::DiffError),

    #[error("graph error: {0}")]
    Graph(#[from] woc_graph::GraphError),
}

pub type SdkResult<T> = Result<T, SdkError>;
