//! Heads and revisions.
//!
//! A [`Head`] is a named reference to an evolving line of content. Its identity
//! is its name alone: two heads with the same name are the same head even if a
//! provider categorised them differently. A [`Revision`] is a point-in-time
//! state of exactly one head; what makes two revisions equal is up to the
//! provider.

use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::{CommitSha, HeadName};

// ---------------------------------------------------------------------------
// Head
// ---------------------------------------------------------------------------

/// Category of a head. Informational only; not part of head identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadKind {
    /// A mutable line of development.
    #[default]
    Branch,
    /// A fixed, named point in history.
    Tag,
    /// A proposal to merge one line into another (pull/merge/change request).
    ChangeRequest,
}

/// A named reference discovered by a source.
///
/// Equality, ordering and hashing consider the name only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Head {
    name: HeadName,
    kind: HeadKind,
}

impl Head {
    /// Creates a head of the given kind.
    pub fn new(name: HeadName, kind: HeadKind) -> Self {
        Self { name, kind }
    }

    /// Creates a branch head, returning `None` if `name` is empty.
    pub fn branch(name: impl Into<String>) -> Option<Self> {
        HeadName::new(name).map(|n| Self::new(n, HeadKind::Branch))
    }

    /// Creates a tag head, returning `None` if `name` is empty.
    pub fn tag(name: impl Into<String>) -> Option<Self> {
        HeadName::new(name).map(|n| Self::new(n, HeadKind::Tag))
    }

    /// Creates a change-request head, returning `None` if `name` is empty.
    pub fn change_request(name: impl Into<String>) -> Option<Self> {
        HeadName::new(name).map(|n| Self::new(n, HeadKind::ChangeRequest))
    }

    /// Returns the head name.
    pub fn name(&self) -> &HeadName {
        &self.name
    }

    /// Returns the head category.
    pub fn kind(&self) -> HeadKind {
        self.kind
    }
}

impl PartialEq for Head {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Head {}

impl PartialOrd for Head {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Head {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl Hash for Head {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl std::fmt::Display for Head {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ---------------------------------------------------------------------------
// Revision
// ---------------------------------------------------------------------------

/// A specific state of one head.
///
/// Implementations decide what equality means (commit hash, change number plus
/// patchset, ...). A revision must always report the head it belongs to.
pub trait Revision: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    /// The head this revision belongs to.
    fn head(&self) -> &Head;

    /// Whether checking out this revision twice yields identical content.
    ///
    /// Merge-preview revisions of change requests are the usual exception.
    fn is_deterministic(&self) -> bool {
        true
    }
}

/// Revision identified by a commit hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitRevision {
    head: Head,
    sha: CommitSha,
}

impl CommitRevision {
    /// Creates a revision of `head` at commit `sha`.
    pub fn new(head: Head, sha: CommitSha) -> Self {
        Self { head, sha }
    }

    /// Returns the commit hash.
    pub fn sha(&self) -> &CommitSha {
        &self.sha
    }
}

impl Revision for CommitRevision {
    fn head(&self) -> &Head {
        &self.head
    }
}

impl std::fmt::Display for CommitRevision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.head, self.sha)
    }
}
