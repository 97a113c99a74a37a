//! Precomputed relation edges of the WoC archive.
//!
//! A relation maps one key (a commit or blob key, or a project, file or
//! author identifier) to a list: either LZF-framed `;`-separated identifiers
//! or concatenated 20-byte object keys. Absent relation data is an empty
//! list, never an error.

pub mod error;
pub mod index;
pub mod relation;

pub use error::{RelationError, RelationResult};
pub use index::RelationIndex;
pub use relation::{
    decode_identifiers, decode_keys, decode_relation, Encoding, Relation, EMPTY_SENTINEL,
};
