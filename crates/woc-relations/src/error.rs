use woc_codec::CodecError;
use woc_store::StoreError;

use crate::relation::{Encoding, Relation};

/// Errors from relation lookups.
#[derive(Debug, thiserror::Error)]
pub enum RelationError {
    /// The relation value could not be decompressed.
    #[error("corrupt relation value: {0}")]
    Codec(#[from] CodecError),

    /// The underlying shard could not be read.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A typed accessor was used on a relation with another encoding.
    #[error("relation {relation} is not encoded as {expected:?}")]
    WrongEncoding {
        relation: Relation,
        expected: Encoding,
    },
}

/// Result alias for relation operations.
pub type RelationResult<T> = Result<T, RelationError>;
