//! The commit graph of one project.
//!
//! [`ProjectCommits`] loads every member commit of a project once and
//! answers history questions from the loaded headers.
//!
//! # Timestamps
//!
//! Author clocks are unreliable: commits dated before the project's
//! earliest root commit are treated as undated. The commits themselves are
//! not modified; only ordering within this view uses the corrected times.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;
use woc_objects::{Commit, GitObject, Project};
use woc_store::ShardStore;
use woc_types::{unknown_time_sentinel, CommitTime, ObjectKey};

use crate::error::GraphResult;

/// Loaded member commits of a project.
pub struct ProjectCommits {
    store: Arc<ShardStore>,
    /// Member keys in project order.
    order: Vec<ObjectKey>,
    commits: HashMap<ObjectKey, Commit>,
    /// Authored times after correction; `None` when unknown.
    authored: HashMap<ObjectKey, Option<CommitTime>>,
    /// Every key some member lists as a parent.
    parents: HashSet<ObjectKey>,
    /// Keys some member lists as its first parent.
    first_parents: HashSet<ObjectKey>,
    earliest_root: CommitTime,
}

impl ProjectCommits {
    /// Load the project's commits, skipping commits missing from the
    /// archive and automated merge-button commits.
    pub fn load(project: &Project) -> GraphResult<Self> {
        let commits = project.commits()?.collect::<Result<Vec<_>, _>>()?;
        debug!(project = project.uri(), commits = commits.len(), "loaded project commits");
        Self::from_commits(Arc::clone(project.store()), commits)
    }

    /// Build the graph over an explicit set of commits.
    pub fn from_commits(store: Arc<ShardStore>, commits: Vec<Commit>) -> GraphResult<Self> {
        let mut order = Vec::with_capacity(commits.len());
        let mut by_key = HashMap::with_capacity(commits.len());
        let mut raw_times = HashMap::with_capacity(commits.len());
        let mut parents = HashSet::new();
        let mut first_parents = HashSet::new();
        let mut root_times = Vec::new();

        for commit in commits {
            let key = commit.key();
            let header = commit.header()?;
            parents.extend(header.parents.iter().copied());
            match header.parents.first() {
                Some(first) => {
                    first_parents.insert(*first);
                }
                None => root_times.extend(header.authored_at),
            }
            raw_times.insert(key, header.authored_at);
            if by_key.insert(key, commit).is_none() {
                order.push(key);
            }
        }

        let earliest_root = root_times
            .into_iter()
            .min()
            .unwrap_or_else(unknown_time_sentinel);
        let authored: HashMap<_, _> = raw_times
            .into_iter()
            .map(|(key, time)| {
                let corrected = time.filter(|t| *t >= earliest_root);
                if time.is_some() && corrected.is_none() {
                    debug!(commit = %key, "authored before the earliest root, treating as unknown");
                }
                (key, corrected)
            })
            .collect();

        Ok(Self {
            store,
            order,
            commits: by_key,
            authored,
            parents,
            first_parents,
            earliest_root,
        })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.commits.contains_key(key)
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&Commit> {
        self.commits.get(key)
    }

    /// Member commits in project order.
    pub fn commits(&self) -> impl Iterator<Item = &Commit> + '_ {
        self.order.iter().filter_map(|key| self.commits.get(key))
    }

    /// Earliest authored time among root commits, or the epoch when no
    /// root has one.
    pub fn earliest_root(&self) -> CommitTime {
        self.earliest_root
    }

    /// Corrected authored time of a member.
    pub fn authored_at(&self, key: &ObjectKey) -> Option<CommitTime> {
        self.authored.get(key).copied().flatten()
    }

    /// Ordering key: corrected time (epoch when unknown), then key.
    fn rank(&self, key: &ObjectKey) -> (CommitTime, ObjectKey) {
        (
            self.authored_at(key).unwrap_or_else(unknown_time_sentinel),
            *key,
        )
    }

    fn latest<'a>(&self, keys: impl Iterator<Item = &'a ObjectKey>) -> Option<ObjectKey> {
        keys.max_by_key(|key| self.rank(key)).copied()
    }

    /// The latest commit no member names as a parent.
    pub fn head(&self) -> Option<&Commit> {
        let heads = self.order.iter().filter(|key| !self.parents.contains(*key));
        self.latest(heads).and_then(|key| self.commits.get(&key))
    }

    /// The root commit the history starts from: a parentless member that
    /// is some member's first parent. The earliest wins if there are
    /// several.
    pub fn tail(&self) -> Option<&Commit> {
        self.order
            .iter()
            .filter(|key| self.first_parents.contains(*key))
            .filter(|key| {
                self.commits
                    .get(*key)
                    .and_then(|c| c.parent_keys().ok())
                    .is_some_and(<[ObjectKey]>::is_empty)
            })
            .min_by_key(|key| self.rank(key))
            .and_then(|key| self.commits.get(key))
    }

    /// Walk first parents from the latest member back to the root.
    ///
    /// Commits outside the project are loaded on demand. The walk ends at a
    /// parentless commit, a commit missing from the archive, or a key seen
    /// before.
    pub fn first_parent_chain(&self) -> FirstParentChain<'_> {
        FirstParentChain {
            graph: self,
            next: self.latest(self.order.iter()),
            seen: HashSet::new(),
        }
    }
}

/// Iterator returned by [`ProjectCommits::first_parent_chain`], latest
/// commit first.
pub struct FirstParentChain<'a> {
    graph: &'a ProjectCommits,
    next: Option<ObjectKey>,
    seen: HashSet<ObjectKey>,
}

impl<'a> Iterator for FirstParentChain<'a> {
    type Item = GraphResult<Cow<'a, Commit>>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.next.take()?;
        if !self.seen.insert(key) {
            debug!(commit = %key, "first-parent chain revisits a commit, stopping");
            return None;
        }
        let commit = match self.graph.commits.get(&key) {
            Some(commit) => Cow::Borrowed(commit),
            None => Cow::Owned(Commit::from_key(Arc::clone(&self.graph.store), key)),
        };
        self.next = match commit.parent_keys() {
            Ok(parents) => parents.first().copied(),
            Err(e) if e.is_not_found() => {
                debug!(commit = %key, "first-parent chain reached a missing commit");
                return None;
            }
            Err(e) => return Some(Err(e.into())),
        };
        Some(Ok(commit))
    }
}
