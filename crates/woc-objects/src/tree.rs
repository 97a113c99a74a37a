use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use woc_store::{Category, ShardStore};
use woc_types::{ObjectKey, KEY_LEN};

use crate::blob::Blob;
use crate::error::{ObjectError, ObjectResult};
use crate::kind::ObjectKind;
use crate::object::{fetch_object, get_or_try_init, GitObject};
use crate::sequential::SequentialObjects;

/// Deepest subtree nesting [`Tree::traverse`] follows.
pub const MAX_TREE_DEPTH: usize = 1024;

/// Mode of a tree entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileMode {
    Regular,
    Executable,
    Symlink,
    Submodule,
    Tree,
    /// Any other mode token, kept as stored. Read as a leaf.
    Other(String),
}

impl FileMode {
    /// Parse the mode token git stores. Group-writable regular files from
    /// old git versions count as regular; other tokens are kept verbatim.
    /// Only an empty or non-ASCII token is rejected.
    pub fn parse(mode: &[u8]) -> Option<Self> {
        match mode {
            b"100644" | b"100664" => Some(Self::Regular),
            b"100755" => Some(Self::Executable),
            b"120000" => Some(Self::Symlink),
            b"160000" => Some(Self::Submodule),
            b"40000" | b"040000" => Some(Self::Tree),
            [] => None,
            other if other.is_ascii() => {
                Some(Self::Other(String::from_utf8_lossy(other).into_owned()))
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Regular => "100644",
            Self::Executable => "100755",
            Self::Symlink => "120000",
            Self::Submodule => "160000",
            Self::Tree => "40000",
            Self::Other(mode) => mode,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Tree)
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `mode name key` triple of a tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeEntry {
    pub mode: FileMode,
    /// Name bytes as stored; git does not require UTF-8.
    pub name: Vec<u8>,
    pub key: ObjectKey,
}

impl TreeEntry {
    pub fn new(mode: FileMode, name: impl Into<Vec<u8>>, key: ObjectKey) -> Self {
        Self {
            mode,
            name: name.into(),
            key,
        }
    }

    /// The name as text; see [`display_name`].
    pub fn name_str(&self) -> Cow<'_, str> {
        display_name(&self.name)
    }
}

/// Name bytes as text. Bytes that are not valid UTF-8 are written as
/// `\xNN` escapes, so names differing only in invalid bytes stay distinct.
pub fn display_name(name: &[u8]) -> Cow<'_, str> {
    if let Ok(text) = std::str::from_utf8(name) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(name.len() + 8);
    for chunk in name.utf8_chunks() {
        out.push_str(chunk.valid());
        for byte in chunk.invalid() {
            let _ = write!(out, "\\x{byte:02x}");
        }
    }
    Cow::Owned(out)
}

/// Parse a decompressed tree body into its entries, in stored order.
pub fn parse_tree(key: &ObjectKey, raw: &[u8]) -> ObjectResult<Vec<TreeEntry>> {
    let truncated = || ObjectError::Parse(format!("truncated entry in tree {key}"));
    let mut entries = Vec::new();
    let mut rest = raw;
    while !rest.is_empty() {
        let space = rest.iter().position(|&b| b == b' ').ok_or_else(truncated)?;
        let mode = FileMode::parse(&rest[..space]).ok_or_else(|| {
            ObjectError::Parse(format!(
                "invalid mode {:?} in tree {key}",
                String::from_utf8_lossy(&rest[..space])
            ))
        })?;
        rest = &rest[space + 1..];

        let nul = rest.iter().position(|&b| b == 0).ok_or_else(truncated)?;
        let name = rest[..nul].to_vec();
        rest = &rest[nul + 1..];

        if rest.len() < KEY_LEN {
            return Err(truncated());
        }
        let (entry_key, tail) = rest.split_at(KEY_LEN);
        entries.push(TreeEntry {
            mode,
            name,
            key: ObjectKey::from_slice(entry_key)?,
        });
        rest = tail;
    }
    Ok(entries)
}

/// Serialize entries in git's binary tree format.
pub fn encode_tree(entries: &[TreeEntry]) -> Vec<u8> {
    let mut out = Vec::new();
    for entry in entries {
        out.extend_from_slice(entry.mode.as_str().as_bytes());
        out.push(b' ');
        out.extend_from_slice(&entry.name);
        out.push(0);
        out.extend_from_slice(entry.key.as_bytes());
    }
    out
}

/// A tree, parsed on first access.
#[derive(Clone)]
pub struct Tree {
    store: Arc<ShardStore>,
    key: ObjectKey,
    raw: OnceLock<Vec<u8>>,
    entries: OnceLock<Vec<TreeEntry>>,
    files: OnceLock<BTreeMap<String, ObjectKey>>,
}

impl GitObject for Tree {
    const KIND: ObjectKind = ObjectKind::Tree;

    fn from_key(store: Arc<ShardStore>, key: ObjectKey) -> Self {
        Self {
            store,
            key,
            raw: OnceLock::new(),
            entries: OnceLock::new(),
            files: OnceLock::new(),
        }
    }

    fn key(&self) -> ObjectKey {
        self.key
    }

    fn raw_content(&self) -> ObjectResult<&[u8]> {
        get_or_try_init(&self.raw, || {
            fetch_object(&self.store, Category::TreeRandom, &self.key)
        })
        .map(Vec::as_slice)
    }
}

impl Tree {
    /// A tree whose body is already known, as read by [`Tree::all`].
    pub fn with_content(store: Arc<ShardStore>, key: ObjectKey, raw: Vec<u8>) -> Self {
        let tree = Self::from_key(store, key);
        let _ = tree.raw.set(raw);
        tree
    }

    /// Every tree in the archive, shard by shard.
    pub fn all(store: &Arc<ShardStore>) -> ObjectResult<SequentialObjects<Tree>> {
        SequentialObjects::new(
            store,
            Category::TreeSequentialIdx,
            Category::TreeSequentialBin,
            Tree::with_content,
        )
    }

    /// Store the object reads from.
    pub fn store(&self) -> &Arc<ShardStore> {
        &self.store
    }

    /// Direct entries, in stored order.
    pub fn entries(&self) -> ObjectResult<&[TreeEntry]> {
        get_or_try_init(&self.entries, || parse_tree(&self.key, self.raw_content()?))
            .map(Vec::as_slice)
    }

    /// Depth-first, pre-order walk over all nested entries. Subtrees are
    /// loaded only as the walk reaches them.
    pub fn traverse(&self) -> Traverse {
        Traverse {
            store: Arc::clone(&self.store),
            root: Some(self.clone()),
            stack: Vec::new(),
            pending: Some(Pending {
                key: self.key,
                prefix: String::new(),
                depth: 0,
            }),
        }
    }

    /// Path → blob key of every non-subtree entry. A path listed twice
    /// keeps its last key.
    pub fn files(&self) -> ObjectResult<&BTreeMap<String, ObjectKey>> {
        get_or_try_init(&self.files, || {
            let mut files = BTreeMap::new();
            for item in self.traverse() {
                let item = item?;
                if !item.mode.is_tree() {
                    files.insert(item.path, item.key);
                }
            }
            Ok::<_, ObjectError>(files)
        })
    }

    /// Number of files under the tree, at any depth.
    pub fn len(&self) -> ObjectResult<usize> {
        Ok(self.files()?.len())
    }

    /// Whether the tree holds no files at any depth.
    pub fn is_empty(&self) -> ObjectResult<bool> {
        Ok(self.files()?.is_empty())
    }

    /// Whether `path` names a file, not a subtree.
    pub fn contains_path(&self, path: &str) -> ObjectResult<bool> {
        Ok(self.files()?.contains_key(path))
    }

    /// Whether any file has blob `key`.
    pub fn contains_blob(&self, key: &ObjectKey) -> ObjectResult<bool> {
        Ok(self.files()?.values().any(|k| k == key))
    }

    /// Blob keys in path order.
    pub fn blob_keys(&self) -> ObjectResult<Vec<ObjectKey>> {
        Ok(self.files()?.values().copied().collect())
    }

    pub fn blobs(&self) -> ObjectResult<impl Iterator<Item = Blob> + '_> {
        Ok(self
            .files()?
            .values()
            .map(|key| Blob::from_key(Arc::clone(&self.store), *key)))
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tree({})", self.key.short_hex())
    }
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Tree {}

/// An entry reached by [`Tree::traverse`], named by its full path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeItem {
    pub mode: FileMode,
    pub path: String,
    pub key: ObjectKey,
}

struct Pending {
    key: ObjectKey,
    prefix: String,
    depth: usize,
}

struct Frame {
    prefix: String,
    depth: usize,
    entries: std::vec::IntoIter<TreeEntry>,
}

/// Lazy iterator returned by [`Tree::traverse`]. Stops after the first
/// error.
pub struct Traverse {
    store: Arc<ShardStore>,
    /// The starting tree, whose content may already be loaded.
    root: Option<Tree>,
    stack: Vec<Frame>,
    pending: Option<Pending>,
}

impl Traverse {
    fn expand(&mut self, pending: Pending) -> ObjectResult<()> {
        if pending.depth > MAX_TREE_DEPTH {
            return Err(ObjectError::TreeTooDeep {
                key: pending.key,
                limit: MAX_TREE_DEPTH,
            });
        }
        let tree = self
            .root
            .take()
            .unwrap_or_else(|| Tree::from_key(Arc::clone(&self.store), pending.key));
        let entries = tree.entries()?.to_vec();
        self.stack.push(Frame {
            prefix: pending.prefix,
            depth: pending.depth,
            entries: entries.into_iter(),
        });
        Ok(())
    }
}

impl Iterator for Traverse {
    type Item = ObjectResult<TreeItem>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(pending) = self.pending.take() {
            if let Err(e) = self.expand(pending) {
                self.stack.clear();
                return Some(Err(e));
            }
        }
        loop {
            let frame = self.stack.last_mut()?;
            let Some(entry) = frame.entries.next() else {
                self.stack.pop();
                continue;
            };
            let path = match entry.name_str() {
                name if frame.prefix.is_empty() => name.into_owned(),
                name => format!("{}/{name}", frame.prefix),
            };
            if entry.mode.is_tree() {
                self.pending = Some(Pending {
                    key: entry.key,
                    prefix: path.clone(),
                    depth: frame.depth + 1,
                });
            }
            return Some(Ok(TreeItem {
                mode: entry.mode,
                path,
                key: entry.key,
            }));
        }
    }
}
