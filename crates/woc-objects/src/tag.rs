use std::fmt;
use std::sync::{Arc, OnceLock};

use woc_store::ShardStore;
use woc_types::ObjectKey;

use crate::error::{ObjectError, ObjectResult};
use crate::kind::ObjectKind;
use crate::object::GitObject;

/// An annotated tag.
///
/// The archive keeps no random-access store for tags, so content is only
/// available on instances built with [`Tag::with_content`].
#[derive(Clone)]
pub struct Tag {
    key: ObjectKey,
    raw: OnceLock<Vec<u8>>,
}

impl GitObject for Tag {
    const KIND: ObjectKind = ObjectKind::Tag;

    fn from_key(_store: Arc<ShardStore>, key: ObjectKey) -> Self {
        Self {
            key,
            raw: OnceLock::new(),
        }
    }

    fn key(&self) -> ObjectKey {
        self.key
    }

    fn raw_content(&self) -> ObjectResult<&[u8]> {
        self.raw
            .get()
            .map(Vec::as_slice)
            .ok_or(ObjectError::NoRandomAccess {
                kind: ObjectKind::Tag,
                key: self.key,
            })
    }
}

impl Tag {
    pub fn with_content(key: ObjectKey, raw: Vec<u8>) -> Self {
        Self {
            key,
            raw: OnceLock::from(raw),
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.key.short_hex())
    }
}
