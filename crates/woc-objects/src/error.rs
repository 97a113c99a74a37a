use woc_codec::CodecError;
use woc_relations::RelationError;
use woc_store::StoreError;
use woc_types::{ObjectKey, TypeError};

use crate::kind::ObjectKind;

/// Errors from object model operations.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    /// A key is neither 20 raw bytes nor 40 hex characters.
    #[error("invalid key: {0}")]
    InvalidKey(#[from] TypeError),

    /// The archive has no content for the object.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// Stored content failed to decompress.
    #[error("corrupt data: {0}")]
    CorruptData(#[from] CodecError),

    /// Decompressed content does not follow the git object grammar.
    #[error("parse error: {0}")]
    Parse(String),

    /// The object type has no random-access store.
    #[error("{kind} {key} has no random access store")]
    NoRandomAccess { kind: ObjectKind, key: ObjectKey },

    /// Subtrees nest deeper than any real repository does, which only a
    /// cyclic tree reference produces.
    #[error("tree {key} nests deeper than {limit} levels")]
    TreeTooDeep { key: ObjectKey, limit: usize },

    #[error("relation error: {0}")]
    Relation(RelationError),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for ObjectError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ObjectNotFound { .. } => Self::ObjectNotFound(e.to_string()),
            other => Self::Store(other),
        }
    }
}

impl From<RelationError> for ObjectError {
    fn from(e: RelationError) -> Self {
        match e {
            RelationError::Codec(e) => Self::CorruptData(e),
            RelationError::Store(e) => e.into(),
            other => Self::Relation(other),
        }
    }
}

impl ObjectError {
    /// Whether the error means the object is absent from the archive.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ObjectNotFound(_))
    }
}

/// Result alias for object model operations.
pub type ObjectResult<T> = Result<T, ObjectError>;
