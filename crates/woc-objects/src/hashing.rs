use std::fs;
use std::io::{self, Read};
use std::path::Path;

use sha1::{Digest, Sha1};
use woc_types::{ObjectKey, KEY_LEN};

use crate::kind::ObjectKind;

/// Git content hasher: SHA-1 over `"<type> <length>\0"` followed by the
/// content, which is how git names every object.
pub struct GitHasher {
    kind: ObjectKind,
}

impl GitHasher {
    pub const COMMIT: Self = Self::new(ObjectKind::Commit);
    pub const TREE: Self = Self::new(ObjectKind::Tree);
    pub const BLOB: Self = Self::new(ObjectKind::Blob);
    pub const TAG: Self = Self::new(ObjectKind::Tag);

    pub const fn new(kind: ObjectKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Key of an in-memory object body.
    pub fn hash(&self, data: &[u8]) -> ObjectKey {
        let mut hasher = self.start(data.len() as u64);
        hasher.update(data);
        finish(hasher)
    }

    /// Key of a file's contents, streamed from disk.
    pub fn hash_file(&self, path: impl AsRef<Path>) -> io::Result<ObjectKey> {
        let mut file = fs::File::open(path)?;
        let len = file.metadata()?.len();
        let mut hasher = self.start(len);
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(finish(hasher))
    }

    /// Whether `data` hashes to `expected`.
    pub fn verify(&self, data: &[u8], expected: &ObjectKey) -> bool {
        self.hash(data) == *expected
    }

    fn start(&self, len: u64) -> Sha1 {
        let mut hasher = Sha1::new();
        hasher.update(format!("{} {len}\0", self.kind.as_str()).as_bytes());
        hasher
    }
}

fn finish(hasher: Sha1) -> ObjectKey {
    let digest = hasher.finalize();
    let mut hash = [0u8; KEY_LEN];
    hash.copy_from_slice(&digest);
    ObjectKey::from_hash(hash)
}
