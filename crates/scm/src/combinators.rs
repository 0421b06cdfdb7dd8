//! Observer combinators.
//!
//! Combinators compose observers into a single [`Observer`] so a source never
//! needs to know which termination or filtering policy the caller wants. Each
//! sub-observer keeps its own semantics; the combinator only decides when the
//! whole composition stops.
//!
//! ```
//! use scm::{CommitRevision, Head, Observer, OneFinished, Selector};
//!
//! // Stop as soon as either head is found.
//! let mut a = Selector::<CommitRevision>::new(Head::branch("a").unwrap());
//! let mut b = Selector::<CommitRevision>::new(Head::branch("b").unwrap());
//! let either = OneFinished::new().with(&mut a).with(&mut b);
//! assert!(either.is_observing());
//! ```
//!
//! Sub-observers are usually borrowed (`&mut Selector`) so that the caller can
//! read their results once the combinator is dropped.

use std::cell::OnceCell;
use std::collections::BTreeSet;

use crate::{Head, Observer, Revision, ScmError};

type Boxed<'a, R> = Box<dyn Observer<R> + 'a>;

/// Union of the include sets, or `None` if any observer wants everything.
fn union_includes<R: Revision>(observers: &[Boxed<'_, R>]) -> Option<BTreeSet<Head>> {
    let mut union = BTreeSet::new();
    for observer in observers {
        union.extend(observer.includes()?);
    }
    Some(union)
}

fn observe_active<R: Revision>(
    observers: &mut [Boxed<'_, R>],
    head: &Head,
    revision: &R,
) -> Result<(), ScmError> {
    for observer in observers.iter_mut().filter(|o| o.is_observing()) {
        observer.observe(head.clone(), revision.clone())?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// AllFinished
// ---------------------------------------------------------------------------

/// Observes until every sub-observer has finished.
///
/// Pairs are delegated to each sub-observer still observing. An empty
/// composition is terminal.
pub struct AllFinished<'a, R: Revision> {
    observers: Vec<Boxed<'a, R>>,
    includes: OnceCell<Option<BTreeSet<Head>>>,
}

impl<'a, R: Revision> AllFinished<'a, R> {
    /// Creates an empty composition.
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
            includes: OnceCell::new(),
        }
    }

    /// Adds a sub-observer.
    #[must_use]
    pub fn with(mut self, observer: impl Observer<R> + 'a) -> Self {
        self.observers.push(Box::new(observer));
        self.includes = OnceCell::new();
        self
    }

    /// Number of sub-observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns `true` if there are no sub-observers.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl<R: Revision> Default for AllFinished<'_, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Revision> Observer<R> for AllFinished<'_, R> {
    fn observe(&mut self, head: Head, revision: R) -> Result<(), ScmError> {
        observe_active(&mut self.observers, &head, &revision)
    }

    fn is_observing(&self) -> bool {
        self.observers.iter().any(|o| o.is_observing())
    }

    fn includes(&self) -> Option<BTreeSet<Head>> {
        self.includes
            .get_or_init(|| union_includes(&self.observers))
            .clone()
    }
}

// ---------------------------------------------------------------------------
// OneFinished
// ---------------------------------------------------------------------------

/// Observes until any one sub-observer has finished.
///
/// Pairs are delegated to each sub-observer still observing. An empty
/// composition never finishes on its own.
pub struct OneFinished<'a, R: Revision> {
    observers: Vec<Boxed<'a, R>>,
    includes: OnceCell<Option<BTreeSet<Head>>>,
}

impl<'a, R: Revision> OneFinished<'a, R> {
    /// Creates an empty composition.
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
            includes: OnceCell::new(),
        }
    }

    /// Adds a sub-observer.
    #[must_use]
    pub fn with(mut self, observer: impl Observer<R> + 'a) -> Self {
        self.observers.push(Box::new(observer));
        self.includes = OnceCell::new();
        self
    }

    /// Number of sub-observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns `true` if there are no sub-observers.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl<R: Revision> Default for OneFinished<'_, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Revision> Observer<R> for OneFinished<'_, R> {
    fn observe(&mut self, head: Head, revision: R) -> Result<(), ScmError> {
        observe_active(&mut self.observers, &head, &revision)
    }

    fn is_observing(&self) -> bool {
        self.observers.iter().all(|o| o.is_observing())
    }

    fn includes(&self) -> Option<BTreeSet<Head>> {
        self.includes
            .get_or_init(|| union_includes(&self.observers))
            .clone()
    }
}

// ---------------------------------------------------------------------------
// Wrapped
// ---------------------------------------------------------------------------

/// Base for decorators: forwards all three operations to a delegate.
///
/// Decorators hold a `Wrapped` and forward whatever they do not override.
#[derive(Debug, Clone)]
pub struct Wrapped<O> {
    delegate: O,
}

impl<O> Wrapped<O> {
    /// Wraps `delegate`.
    pub fn new(delegate: O) -> Self {
        Self { delegate }
    }

    /// The wrapped observer.
    pub fn delegate(&self) -> &O {
        &self.delegate
    }

    /// The wrapped observer, mutably.
    pub fn delegate_mut(&mut self) -> &mut O {
        &mut self.delegate
    }

    /// Unwraps the delegate.
    pub fn into_inner(self) -> O {
        self.delegate
    }
}

impl<R: Revision, O: Observer<R>> Observer<R> for Wrapped<O> {
    fn observe(&mut self, head: Head, revision: R) -> Result<(), ScmError> {
        self.delegate.observe(head, revision)
    }

    fn is_observing(&self) -> bool {
        self.delegate.is_observing()
    }

    fn includes(&self) -> Option<BTreeSet<Head>> {
        self.delegate.includes()
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Restricts a delegate to a fixed allow-list of heads.
///
/// Each allowed head is forwarded at most once; later reports of the same head
/// are dropped. The allow-list is intersected with the delegate's own include
/// set at construction.
#[derive(Debug, Clone)]
pub struct Filter<O> {
    inner: Wrapped<O>,
    includes: BTreeSet<Head>,
    remaining: BTreeSet<Head>,
}

impl<O> Filter<O> {
    /// Restricts `delegate` to `heads`.
    pub fn new<R: Revision>(delegate: O, heads: impl IntoIterator<Item = Head>) -> Self
    where
        O: Observer<R>,
    {
        let mut allowed: BTreeSet<Head> = heads.into_iter().collect();
        if let Some(wanted) = delegate.includes() {
            allowed.retain(|h| wanted.contains(h));
        }
        Self {
            inner: Wrapped::new(delegate),
            remaining: allowed.clone(),
            includes: allowed,
        }
    }

    /// Heads not yet forwarded.
    pub fn remaining(&self) -> &BTreeSet<Head> {
        &self.remaining
    }

    /// Unwraps the delegate.
    pub fn into_inner(self) -> O {
        self.inner.into_inner()
    }
}

impl<R: Revision, O: Observer<R>> Observer<R> for Filter<O> {
    fn observe(&mut self, head: Head, revision: R) -> Result<(), ScmError> {
        if self.remaining.remove(&head) {
            self.inner.observe(head, revision)
        } else {
            Ok(())
        }
    }

    fn is_observing(&self) -> bool {
        !self.remaining.is_empty() && self.inner.is_observing()
    }

    fn includes(&self) -> Option<BTreeSet<Head>> {
        Some(self.includes.clone())
    }
}
