//! Observers: sinks for discovered `(Head, Revision)` pairs.
//!
//! A [`crate::Source`] pushes every pair it discovers into an [`Observer`]. The
//! observer decides what to keep and tells the source when it has seen enough
//! through [`Observer::is_observing`]. It may also hint at the heads it cares
//! about through [`Observer::includes`] so the source can skip the rest.
//!
//! The stock observers in this module cover the common questions:
//!
//! | Observer | Question | Terminal when |
//! |----------|----------|---------------|
//! | [`Collector`] | "what exists?" | never |
//! | [`Selector`] | "what is the revision of this head?" | the head is seen |
//! | [`Named`] | same, by name only | the name is seen |
//! | [`Any`] | "does anything exist?" | the first pair is seen |
//! | [`NoneObserver`] | nothing | always |
//!
//! Combinators that build richer policies out of these live in
//! [`crate::combinators`].
//!
//! Observers are single-pass and single-threaded: create one per enumeration
//! and read its result afterwards.

use std::collections::{BTreeMap, BTreeSet};

use crate::{Head, HeadKind, HeadName, Revision, ScmError};

/// A sink for discovered `(Head, Revision)` pairs with early termination.
///
/// Implementations must tolerate repeated calls for the same head and calls for
/// heads outside their [`includes`](Observer::includes) set. Neither is an
/// error; the observer simply decides whether to record the pair.
pub trait Observer<R: Revision> {
    /// Records a discovered pair.
    ///
    /// Returning an error aborts the whole enumeration.
    fn observe(&mut self, head: Head, revision: R) -> Result<(), ScmError>;

    /// Whether further pairs are wanted. Sources stop once this is `false`.
    fn is_observing(&self) -> bool;

    /// The heads worth enumerating, or `None` for all of them.
    ///
    /// This is a cost hint only. Sources may still report heads outside the
    /// set, and observers must not fail when they do.
    fn includes(&self) -> Option<BTreeSet<Head>> {
        None
    }
}

impl<R: Revision, O: Observer<R> + ?Sized> Observer<R> for &mut O {
    fn observe(&mut self, head: Head, revision: R) -> Result<(), ScmError> {
        (**self).observe(head, revision)
    }

    fn is_observing(&self) -> bool {
        (**self).is_observing()
    }

    fn includes(&self) -> Option<BTreeSet<Head>> {
        (**self).includes()
    }
}

impl<R: Revision, O: Observer<R> + ?Sized> Observer<R> for Box<O> {
    fn observe(&mut self, head: Head, revision: R) -> Result<(), ScmError> {
        (**self).observe(head, revision)
    }

    fn is_observing(&self) -> bool {
        (**self).is_observing()
    }

    fn includes(&self) -> Option<BTreeSet<Head>> {
        (**self).includes()
    }
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

/// Collects every pair it is given. Last write wins for a repeated head.
#[derive(Debug, Clone)]
pub struct Collector<R> {
    result: BTreeMap<Head, R>,
}

impl<R> Collector<R> {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self {
            result: BTreeMap::new(),
        }
    }

    /// The pairs collected so far.
    pub fn result(&self) -> &BTreeMap<Head, R> {
        &self.result
    }

    /// Consumes the collector and returns the collected pairs.
    pub fn into_result(self) -> BTreeMap<Head, R> {
        self.result
    }
}

impl<R> Default for Collector<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Revision> Observer<R> for Collector<R> {
    fn observe(&mut self, head: Head, revision: R) -> Result<(), ScmError> {
        self.result.insert(head, revision);
        Ok(())
    }

    fn is_observing(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

/// Looks for the revision of one specific head.
///
/// Terminal once the head has been seen; the first revision wins.
#[derive(Debug, Clone)]
pub struct Selector<R> {
    target: Head,
    result: Option<R>,
}

impl<R> Selector<R> {
    /// Creates a selector for `target`.
    pub fn new(target: Head) -> Self {
        Self {
            target,
            result: None,
        }
    }

    /// The head being looked for.
    pub fn target(&self) -> &Head {
        &self.target
    }

    /// The revision found, or `None` if the head has not been seen.
    pub fn result(&self) -> Option<&R> {
        self.result.as_ref()
    }

    /// Consumes the selector and returns the revision found.
    pub fn into_result(self) -> Option<R> {
        self.result
    }
}

impl<R: Revision> Observer<R> for Selector<R> {
    fn observe(&mut self, head: Head, revision: R) -> Result<(), ScmError> {
        if self.result.is_none() && head == self.target {
            self.result = Some(revision);
        }
        Ok(())
    }

    fn is_observing(&self) -> bool {
        self.result.is_none()
    }

    fn includes(&self) -> Option<BTreeSet<Head>> {
        Some(BTreeSet::from([self.target.clone()]))
    }
}

// ---------------------------------------------------------------------------
// Named
// ---------------------------------------------------------------------------

/// Looks for the revision of the head with a given name.
///
/// Use when the caller holds only a textual reference (from a URL, a config
/// file, a user) rather than a head obtained from an earlier enumeration.
#[derive(Debug, Clone)]
pub struct Named<R> {
    target: HeadName,
    found: Option<(Head, R)>,
}

impl<R> Named<R> {
    /// Creates an observer looking for `target`.
    pub fn new(target: HeadName) -> Self {
        Self {
            target,
            found: None,
        }
    }

    /// The head that matched, with the kind the source reported.
    pub fn head(&self) -> Option<&Head> {
        self.found.as_ref().map(|(h, _)| h)
    }

    /// The revision found, or `None` if no head with that name was seen.
    pub fn result(&self) -> Option<&R> {
        self.found.as_ref().map(|(_, r)| r)
    }

    /// Consumes the observer and returns the matched pair.
    pub fn into_result(self) -> Option<(Head, R)> {
        self.found
    }
}

impl<R: Revision> Observer<R> for Named<R> {
    fn observe(&mut self, head: Head, revision: R) -> Result<(), ScmError> {
        if self.found.is_none() && head.name() == &self.target {
            self.found = Some((head, revision));
        }
        Ok(())
    }

    fn is_observing(&self) -> bool {
        self.found.is_none()
    }

    fn includes(&self) -> Option<BTreeSet<Head>> {
        // Kind is irrelevant: heads compare by name.
        Some(BTreeSet::from([Head::new(
            self.target.clone(),
            HeadKind::default(),
        )]))
    }
}

// ---------------------------------------------------------------------------
// Any
// ---------------------------------------------------------------------------

/// Stops at the first pair of any head.
#[derive(Debug, Clone)]
pub struct Any<R> {
    found: Option<(Head, R)>,
}

impl<R> Any<R> {
    /// Creates an observer waiting for the first pair.
    pub fn new() -> Self {
        Self { found: None }
    }

    /// The first revision seen.
    pub fn result(&self) -> Option<&R> {
        self.found.as_ref().map(|(_, r)| r)
    }

    /// Consumes the observer and returns the first pair seen.
    pub fn into_result(self) -> Option<(Head, R)> {
        self.found
    }
}

impl<R> Default for Any<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Revision> Observer<R> for Any<R> {
    fn observe(&mut self, head: Head, revision: R) -> Result<(), ScmError> {
        if self.found.is_none() {
            self.found = Some((head, revision));
        }
        Ok(())
    }

    fn is_observing(&self) -> bool {
        self.found.is_none()
    }
}

// ---------------------------------------------------------------------------
// NoneObserver
// ---------------------------------------------------------------------------

/// Wants nothing. A placeholder where an observer is required but no
/// observation is desired.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneObserver;

impl<R: Revision> Observer<R> for NoneObserver {
    fn observe(&mut self, _head: Head, _revision: R) -> Result<(), ScmError> {
        Ok(())
    }

    fn is_observing(&self) -> bool {
        false
    }

    fn includes(&self) -> Option<BTreeSet<Head>> {
        Some(BTreeSet::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CommitRevision, CommitSha};

    fn head(name: &str) -> Head {
        Head::branch(name).unwrap()
    }

    fn rev(name: &str, sha: &str) -> CommitRevision {
        CommitRevision::new(head(name), CommitSha::new(sha).unwrap())
    }

    #[test]
    fn collector_keeps_last_revision_per_head() {
        let mut collector = Collector::<CommitRevision>::new();
        collector.observe(head("main"), rev("main", "r1")).unwrap();
        collector.observe(head("main"), rev("main", "r2")).unwrap();
        collector.observe(head("dev"), rev("dev", "r3")).unwrap();

        assert_eq!(collector.result().len(), 2);
        assert_eq!(collector.result()[&head("main")], rev("main", "r2"));
        assert!(collector.is_observing());
        assert_eq!(Observer::<CommitRevision>::includes(&collector), None);
    }

    #[test]
    fn selector_ignores_other_heads_and_keeps_first_match() {
        let mut selector = Selector::<CommitRevision>::new(head("main"));
        assert_eq!(
            Observer::<CommitRevision>::includes(&selector),
            Some(BTreeSet::from([head("main")]))
        );

        selector.observe(head("dev"), rev("dev", "r0")).unwrap();
        assert!(selector.is_observing());

        selector.observe(head("main"), rev("main", "r1")).unwrap();
        selector.observe(head("main"), rev("main", "r2")).unwrap();
        assert!(!selector.is_observing());
        assert_eq!(selector.result(), Some(&rev("main", "r1")));
    }

    #[test]
    fn named_matches_any_kind_with_that_name() {
        let mut named = Named::new(HeadName::new("v2").unwrap());
        let tag = Head::tag("v2").unwrap();
        named
            .observe(tag.clone(), CommitRevision::new(tag, CommitSha::new("t").unwrap()))
            .unwrap();

        assert!(!named.is_observing());
        assert_eq!(named.head().map(Head::kind), Some(HeadKind::Tag));
    }

    #[test]
    fn any_stops_after_first_pair() {
        let mut any = Any::<CommitRevision>::new();
        assert!(Observer::<CommitRevision>::is_observing(&any));
        any.observe(head("a"), rev("a", "1")).unwrap();
        any.observe(head("b"), rev("b", "2")).unwrap();
        assert!(!any.is_observing());
        assert_eq!(any.result(), Some(&rev("a", "1")));
    }

    #[test]
    fn none_observer_is_born_terminal() {
        let mut none = NoneObserver;
        assert!(!Observer::<CommitRevision>::is_observing(&none));
        none.observe(head("a"), rev("a", "1")).unwrap();
        assert_eq!(
            Observer::<CommitRevision>::includes(&none),
            Some(BTreeSet::new())
        );
    }

    #[test]
    fn boxed_and_borrowed_observers_delegate() {
        let mut selector = Selector::<CommitRevision>::new(head("main"));
        {
            let mut borrowed: Box<dyn Observer<CommitRevision> + '_> = Box::new(&mut selector);
            borrowed.observe(head("main"), rev("main", "r9")).unwrap();
            assert!(!borrowed.is_observing());
        }
        assert_eq!(selector.result(), Some(&rev("main", "r9")));
    }
}
