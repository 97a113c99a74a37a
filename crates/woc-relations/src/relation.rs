use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;
use woc_codec::decompress;
use woc_store::{Category, Sharding};
use woc_types::{ObjectKey, KEY_LEN};

use crate::error::RelationResult;

/// Placeholder the archive stores for an empty identifier slot.
pub const EMPTY_SENTINEL: &str = "EMPTY";

/// How a relation value is laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// LZF-framed, `;`-separated identifier strings.
    Identifiers,
    /// Concatenated 20-byte binary object keys, stored as is.
    Keys,
}

/// A precomputed edge of the archive's object graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    CommitProjects,
    CommitChildren,
    CommitFiles,
    BlobCommits,
    BlobFiles,
    ProjectCommits,
    ProjectAuthors,
    AuthorCommits,
    AuthorProjects,
    AuthorFiles,
    FileCommits,
    FileAuthors,
    FileBlobs,
}

impl Relation {
    pub const ALL: [Relation; 13] = [
        Relation::CommitProjects,
        Relation::CommitChildren,
        Relation::CommitFiles,
        Relation::BlobCommits,
        Relation::BlobFiles,
        Relation::ProjectCommits,
        Relation::ProjectAuthors,
        Relation::AuthorCommits,
        Relation::AuthorProjects,
        Relation::AuthorFiles,
        Relation::FileCommits,
        Relation::FileAuthors,
        Relation::FileBlobs,
    ];

    /// The store category holding this relation.
    pub fn category(&self) -> Category {
        match self {
            Self::CommitProjects => Category::CommitProjects,
            Self::CommitChildren => Category::CommitChildren,
            Self::CommitFiles => Category::CommitFiles,
            Self::BlobCommits => Category::BlobCommits,
            Self::BlobFiles => Category::BlobFiles,
            Self::ProjectCommits => Category::ProjectCommits,
            Self::ProjectAuthors => Category::ProjectAuthors,
            Self::AuthorCommits => Category::AuthorCommits,
            Self::AuthorProjects => Category::AuthorProjects,
            Self::AuthorFiles => Category::AuthorFiles,
            Self::FileCommits => Category::FileCommits,
            Self::FileAuthors => Category::FileAuthors,
            Self::FileBlobs => Category::FileBlobs,
        }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            Self::CommitChildren
            | Self::BlobCommits
            | Self::ProjectCommits
            | Self::AuthorCommits
            | Self::FileCommits
            | Self::FileBlobs => Encoding::Keys,
            _ => Encoding::Identifiers,
        }
    }

    /// Git objects are sharded by key prefix, identifiers by hash.
    pub fn sharding(&self) -> Sharding {
        match self {
            Self::CommitProjects
            | Self::CommitChildren
            | Self::CommitFiles
            | Self::BlobCommits
            | Self::BlobFiles => Sharding::Prefix,
            _ => Sharding::Hashed,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category().name())
    }
}

/// Decode a relation value into strings: identifiers as stored, keys as
/// lowercase hex. An absent value decodes to an empty list.
pub fn decode_relation(raw: Option<&[u8]>, encoding: Encoding) -> RelationResult<Vec<String>> {
    match encoding {
        Encoding::Identifiers => decode_identifiers(raw),
        Encoding::Keys => Ok(decode_keys(raw).iter().map(ObjectKey::to_hex).collect()),
    }
}

/// Decompress and split an identifier list, dropping empty tokens and the
/// [`EMPTY_SENTINEL`].
pub fn decode_identifiers(raw: Option<&[u8]>) -> RelationResult<Vec<String>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let data = decompress(raw)?;
    Ok(data
        .split(|&b| b == b';')
        .filter(|token| !token.is_empty() && *token != EMPTY_SENTINEL.as_bytes())
        .map(|token| String::from_utf8_lossy(token).into_owned())
        .collect())
}

/// Slice a key list into 20-byte keys. A trailing partial key is dropped.
pub fn decode_keys(raw: Option<&[u8]>) -> Vec<ObjectKey> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let chunks = raw.chunks_exact(KEY_LEN);
    if !chunks.remainder().is_empty() {
        trace!(
            len = raw.len(),
            "key list length is not a multiple of the key size"
        );
    }
    chunks
        .filter_map(|chunk| ObjectKey::from_slice(chunk).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use woc_codec::compress;

    fn framed(text: &str) -> Vec<u8> {
        compress(text.as_bytes())
    }

    #[test]
    fn absent_values_are_empty() {
        assert!(decode_identifiers(None).unwrap().is_empty());
        assert!(decode_keys(None).is_empty());
        for encoding in [Encoding::Identifiers, Encoding::Keys] {
            assert!(decode_relation(None, encoding).unwrap().is_empty());
        }
    }

    #[test]
    fn identifiers_filter_sentinel_and_empty_tokens() {
        let raw = framed("user2589_minicms;EMPTY;;github.com_a_b;");
        assert_eq!(
            decode_identifiers(Some(raw.as_slice())).unwrap(),
            vec!["user2589_minicms", "github.com_a_b"]
        );
    }

    #[test]
    fn identifiers_from_verbatim_frame() {
        let raw: &[u8] = b"\x00a.py;b/c.py";
        assert_eq!(decode_identifiers(Some(raw)).unwrap(), vec!["a.py", "b/c.py"]);
    }

    #[test]
    fn identifiers_from_compressed_frame() {
        let names: Vec<String> = (0..50).map(|i| format!("src/module_{i}.rs")).collect();
        let raw = framed(&names.join(";"));
        assert_ne!(raw[0], 0);
        assert_eq!(decode_identifiers(Some(raw.as_slice())).unwrap(), names);
    }

    #[test]
    fn corrupt_identifier_frame_is_an_error() {
        assert!(decode_identifiers(Some(&[0xC4u8][..])).is_err());
    }

    #[test]
    fn keys_slice_every_twenty_bytes() {
        let mut raw = vec![0xAA; 20];
        raw.extend([0xBB; 20]);
        raw.extend([0xCC; 7]);
        let keys = decode_keys(Some(raw.as_slice()));
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].to_hex(), "aa".repeat(20));
        assert_eq!(
            decode_relation(Some(raw.as_slice()), Encoding::Keys).unwrap()[1],
            "bb".repeat(20)
        );
    }

    #[test]
    fn relation_table() {
        assert_eq!(Relation::ProjectCommits.category(), Category::ProjectCommits);
        assert_eq!(Relation::ProjectCommits.encoding(), Encoding::Keys);
        assert_eq!(Relation::ProjectCommits.sharding(), Sharding::Hashed);
        assert_eq!(Relation::CommitProjects.encoding(), Encoding::Identifiers);
        assert_eq!(Relation::CommitProjects.sharding(), Sharding::Prefix);
        assert_eq!(Relation::FileBlobs.to_string(), "file_blobs");
        for relation in Relation::ALL {
            assert_eq!(relation.category().name(), relation.to_string());
        }
    }
}
