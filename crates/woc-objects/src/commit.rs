use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use woc_relations::{Relation, RelationIndex};
use woc_store::{Category, ShardStore};
use woc_types::{parse_commit_time, CommitTime, ObjectKey};

use crate::error::{ObjectError, ObjectResult};
use crate::kind::ObjectKind;
use crate::object::{fetch_object, get_or_try_init, GitObject};
use crate::project::Project;
use crate::sequential::SequentialObjects;
use crate::tree::Tree;

/// Author of the automated merge commits the GitHub web UI creates.
pub const MERGE_BUTTON_AUTHOR: &str = "GitHub Merge Button <merge-button@github.com>";

/// Parsed header and message of a commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommitHeader {
    pub tree: ObjectKey,
    /// In header order; the first parent is the mainline.
    pub parents: Vec<ObjectKey>,
    pub author: String,
    pub authored_at: Option<CommitTime>,
    pub committer: String,
    pub committed_at: Option<CommitTime>,
    /// First line of the message.
    pub message: String,
    pub full_message: String,
    pub signature: Option<String>,
}

impl CommitHeader {
    /// Parse a decompressed commit body. `key` only labels errors.
    ///
    /// Identities and messages are text: bytes that are not UTF-8, such as
    /// bodies in a legacy `encoding`, are replaced with U+FFFD. The raw body
    /// stays available through [`GitObject::raw_content`].
    pub fn parse(key: &ObjectKey, raw: &[u8]) -> ObjectResult<Self> {
        let text = String::from_utf8_lossy(raw);
        let (header, full_message) = text.split_once("\n\n").unwrap_or((&*text, ""));
        let unexpected = || ObjectError::Parse(format!("unexpected header in commit {key}"));

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = (String::new(), None);
        let mut committer = (String::new(), None);
        let mut signature: Option<String> = None;
        let mut in_signature = false;

        for line in header.lines() {
            if in_signature {
                if let Some(sig) = signature.as_mut() {
                    sig.push('\n');
                    sig.push_str(line.strip_prefix(' ').unwrap_or(line));
                }
                in_signature = !is_armor_end(line);
                continue;
            }
            if line.starts_with(' ') || line.trim().is_empty() {
                continue;
            }
            let (field, value) = line.split_once(' ').ok_or_else(unexpected)?;
            match field {
                "tree" => tree = Some(parse_key(key, value)?),
                "parent" => parents.push(parse_key(key, value)?),
                "author" => author = split_identity(value),
                "committer" => committer = split_identity(value),
                "gpgsig" => {
                    signature = Some(value.to_string());
                    in_signature = !is_armor_end(value);
                }
                "encoding" | "mergetag" => {}
                _ => return Err(unexpected()),
            }
        }

        let tree = tree.ok_or_else(|| ObjectError::Parse(format!("commit {key} has no tree")))?;
        Ok(Self {
            tree,
            parents,
            author: author.0,
            authored_at: author.1,
            committer: committer.0,
            committed_at: committer.1,
            message: full_message.lines().next().unwrap_or_default().to_string(),
            full_message: full_message.to_string(),
            signature,
        })
    }
}

fn is_armor_end(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("-----END ") && line.ends_with("-----")
}

fn parse_key(commit: &ObjectKey, value: &str) -> ObjectResult<ObjectKey> {
    ObjectKey::from_hex(value.trim())
        .map_err(|e| ObjectError::Parse(format!("bad object reference in commit {commit}: {e}")))
}

/// Split `Name <email> 1337145807 +1100` into identity and time. Lines
/// without the two trailing tokens keep the whole value as identity.
fn split_identity(value: &str) -> (String, Option<CommitTime>) {
    let parts: Vec<&str> = value.rsplitn(3, ' ').collect();
    match parts.as_slice() {
        [tz, ts, identity] => (
            identity.to_string(),
            parse_commit_time(&format!("{ts} {tz}")),
        ),
        _ => (value.to_string(), None),
    }
}

/// A commit, parsed on first access.
#[derive(Clone)]
pub struct Commit {
    store: Arc<ShardStore>,
    key: ObjectKey,
    raw: OnceLock<Vec<u8>>,
    header: OnceLock<CommitHeader>,
    project_names: OnceLock<Vec<String>>,
    child_keys: OnceLock<Vec<ObjectKey>>,
    changed_file_names: OnceLock<Vec<String>>,
}

impl GitObject for Commit {
    const KIND: ObjectKind = ObjectKind::Commit;

    fn from_key(store: Arc<ShardStore>, key: ObjectKey) -> Self {
        Self {
            store,
            key,
            raw: OnceLock::new(),
            header: OnceLock::new(),
            project_names: OnceLock::new(),
            child_keys: OnceLock::new(),
            changed_file_names: OnceLock::new(),
        }
    }

    fn key(&self) -> ObjectKey {
        self.key
    }

    fn raw_content(&self) -> ObjectResult<&[u8]> {
        get_or_try_init(&self.raw, || {
            fetch_object(&self.store, Category::CommitRandom, &self.key)
        })
        .map(Vec::as_slice)
    }
}

impl Commit {
    /// A commit whose body is already known, as read by [`Commit::all`].
    pub fn with_content(store: Arc<ShardStore>, key: ObjectKey, raw: Vec<u8>) -> Self {
        let commit = Self::from_key(store, key);
        let _ = commit.raw.set(raw);
        commit
    }

    /// Every commit in the archive, shard by shard.
    pub fn all(store: &Arc<ShardStore>) -> ObjectResult<SequentialObjects<Commit>> {
        SequentialObjects::new(
            store,
            Category::CommitSequentialIdx,
            Category::CommitSequentialBin,
            Commit::with_content,
        )
    }

    /// Store the object reads from.
    pub fn store(&self) -> &Arc<ShardStore> {
        &self.store
    }

    /// The parsed header, read and parsed once.
    pub fn header(&self) -> ObjectResult<&CommitHeader> {
        get_or_try_init(&self.header, || {
            CommitHeader::parse(&self.key, self.raw_content()?)
        })
    }

    /// Key of the root tree.
    pub fn tree_key(&self) -> ObjectResult<ObjectKey> {
        Ok(self.header()?.tree)
    }

    /// The root tree.
    pub fn tree(&self) -> ObjectResult<Tree> {
        Ok(Tree::from_key(Arc::clone(&self.store), self.tree_key()?))
    }

    /// Parent keys in header order; the first is the mainline.
    pub fn parent_keys(&self) -> ObjectResult<&[ObjectKey]> {
        Ok(&self.header()?.parents)
    }

    pub fn parents(&self) -> ObjectResult<impl Iterator<Item = Commit> + '_> {
        Ok(self
            .parent_keys()?
            .iter()
            .map(|key| Commit::from_key(Arc::clone(&self.store), *key)))
    }

    /// Author identity, `Name <email>`.
    pub fn author(&self) -> ObjectResult<&str> {
        Ok(&self.header()?.author)
    }

    /// Authored time; `None` when malformed or in the future.
    pub fn authored_at(&self) -> ObjectResult<Option<CommitTime>> {
        Ok(self.header()?.authored_at)
    }

    /// Committer identity, `Name <email>`.
    pub fn committer(&self) -> ObjectResult<&str> {
        Ok(&self.header()?.committer)
    }

    pub fn committed_at(&self) -> ObjectResult<Option<CommitTime>> {
        Ok(self.header()?.committed_at)
    }

    /// First line of the commit message.
    pub fn message(&self) -> ObjectResult<&str> {
        Ok(&self.header()?.message)
    }

    /// The whole message after the header.
    pub fn full_message(&self) -> ObjectResult<&str> {
        Ok(&self.header()?.full_message)
    }

    /// The `gpgsig` block, continuation lines unindented.
    pub fn signature(&self) -> ObjectResult<Option<&str>> {
        Ok(self.header()?.signature.as_deref())
    }

    /// Blobs of the commit's tree.
    pub fn blob_keys(&self) -> ObjectResult<Vec<ObjectKey>> {
        self.tree()?.blob_keys()
    }

    fn relations(&self) -> RelationIndex {
        RelationIndex::new(Arc::clone(&self.store))
    }

    /// Projects containing the commit.
    pub fn project_names(&self) -> ObjectResult<&[String]> {
        get_or_try_init(&self.project_names, || {
            Ok::<_, ObjectError>(
                self.relations()
                    .fetch_identifiers(Relation::CommitProjects, self.key.as_bytes())?,
            )
        })
        .map(Vec::as_slice)
    }

    pub fn projects(&self) -> ObjectResult<impl Iterator<Item = Project> + '_> {
        Ok(self
            .project_names()?
            .iter()
            .map(|name| Project::new(Arc::clone(&self.store), name.as_str())))
    }

    /// Commits naming this one as a parent.
    pub fn child_keys(&self) -> ObjectResult<&[ObjectKey]> {
        get_or_try_init(&self.child_keys, || {
            Ok::<_, ObjectError>(
                self.relations()
                    .fetch_keys(Relation::CommitChildren, self.key.as_bytes())?,
            )
        })
        .map(Vec::as_slice)
    }

    pub fn children(&self) -> ObjectResult<impl Iterator<Item = Commit> + '_> {
        Ok(self
            .child_keys()?
            .iter()
            .map(|key| Commit::from_key(Arc::clone(&self.store), *key)))
    }

    /// Paths the commit changed relative to its parents.
    pub fn changed_file_names(&self) -> ObjectResult<&[String]> {
        get_or_try_init(&self.changed_file_names, || {
            Ok::<_, ObjectError>(
                self.relations()
                    .fetch_identifiers(Relation::CommitFiles, self.key.as_bytes())?,
            )
        })
        .map(Vec::as_slice)
    }
}

impl fmt::Debug for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commit({})", self.key.short_hex())
    }
}

impl PartialEq for Commit {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Commit {}

impl Hash for Commit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}
