//! The contract a provider implements to feed observers.
//!
//! A [`Source`] enumerates the heads it can see into an [`Observer`]. It also
//! judges incoming [`HeadEvent`]s: whether an event concerns it, and which
//! pairs the event implies from its point of view. What the event implies is
//! never taken at face value; [`fetch`] confirms it against a real enumeration
//! through a [`ValidatingObserver`].
//!
//! Everything an enumeration needs besides the observer travels in an explicit
//! [`FetchContext`]: the cooperative [`Interrupt`] flag and optional
//! [`Criteria`]. Nothing is read from ambient per-thread state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::{
    Head, HeadEvent, Observer, Revision, ScmError, SourceName, ValidatingObserver,
    ValidationOutcome,
};

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// A provider of heads and revisions.
///
/// Enumeration is blocking. Implementations performing I/O should call
/// [`FetchContext::check_interrupted`] between requests and stop as soon as
/// [`Observer::is_observing`] returns `false`.
pub trait Source: Send + Sync {
    /// The revision type this source produces.
    type Revision: Revision;

    /// The payload type of the events this source understands.
    type Payload;

    /// The name events use to address this source.
    fn name(&self) -> &SourceName;

    /// Reports the current pairs into `observer`.
    ///
    /// [`Observer::includes`] may be used to skip heads, but it is a hint:
    /// reporting extra heads is allowed.
    fn enumerate(
        &self,
        observer: &mut dyn Observer<Self::Revision>,
        ctx: &FetchContext<'_>,
    ) -> Result<(), ScmError>;

    /// Whether `event` concerns this source.
    fn matches(&self, event: &HeadEvent<Self::Payload>) -> bool {
        event.source_name() == self.name()
    }

    /// The pairs `event` claims exist, as this source reads the payload.
    ///
    /// The result is unverified. Malformed payloads imply nothing.
    fn implied_pairs(&self, event: &HeadEvent<Self::Payload>) -> BTreeMap<Head, Self::Revision>;
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Cooperative cancellation flag shared between a caller and an enumeration.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    /// Creates a lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every enumeration holding this flag to stop.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether the flag has been raised.
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fails with [`ScmError::Interrupted`] if the flag has been raised.
    pub fn check(&self) -> Result<(), ScmError> {
        if self.is_raised() {
            Err(ScmError::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// Decides whether a discovered head qualifies for the caller at all (for
/// example: "has a build descriptor").
pub trait Criteria: Send + Sync {
    /// Returns `true` if `head` should be reported.
    fn accepts(&self, head: &Head) -> bool;
}

impl<F> Criteria for F
where
    F: Fn(&Head) -> bool + Send + Sync,
{
    fn accepts(&self, head: &Head) -> bool {
        self(head)
    }
}

/// Per-enumeration context passed explicitly to [`Source::enumerate`].
#[derive(Clone, Default)]
pub struct FetchContext<'a> {
    interrupt: Interrupt,
    criteria: Option<&'a dyn Criteria>,
}

impl<'a> FetchContext<'a> {
    /// A context with a fresh interrupt flag and no criteria.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `interrupt` as the cancellation flag.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Restricts reported heads to those `criteria` accepts.
    #[must_use]
    pub fn with_criteria(mut self, criteria: &'a dyn Criteria) -> Self {
        self.criteria = Some(criteria);
        self
    }

    /// The cancellation flag.
    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// Fails with [`ScmError::Interrupted`] if the flag has been raised.
    pub fn check_interrupted(&self) -> Result<(), ScmError> {
        self.interrupt.check()
    }

    /// Whether `head` passes the criteria. Always `true` without criteria.
    pub fn accepts(&self, head: &Head) -> bool {
        self.criteria.map_or(true, |c| c.accepts(head))
    }
}

impl std::fmt::Debug for FetchContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchContext")
            .field("interrupt", &self.interrupt)
            .field("criteria", &self.criteria.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Helpers for source implementations and callers
// ---------------------------------------------------------------------------

/// Hands a pair to `observer` after checking that `revision` belongs to `head`.
///
/// Sources should report through this function: a mismatch is a provider bug
/// and fails with [`ScmError::HeadMismatch`].
pub fn report<R, O>(observer: &mut O, head: Head, revision: R) -> Result<(), ScmError>
where
    R: Revision,
    O: Observer<R> + ?Sized,
{
    if revision.head() != &head {
        return Err(ScmError::HeadMismatch {
            actual: revision.head().clone(),
            expected: head,
        });
    }
    observer.observe(head, revision)
}

/// Enumerates `source` into `observer`, optionally scoped by an event.
///
/// - Without an event, this is a plain enumeration and returns `Ok(None)`.
/// - With an event the source does not match, nothing is enumerated and
///   `Ok(None)` is returned: the event is not this source's concern, so there
///   is no outcome to judge stale.
/// - Otherwise only the pairs the event implies are looked for, and only those
///   the source actually reports reach `observer`.
///
/// Deciding what to do with a stale outcome (see
/// [`ValidationOutcome::is_stale`]) is left to the caller.
pub fn fetch<S>(
    source: &S,
    observer: &mut dyn Observer<S::Revision>,
    event: Option<&HeadEvent<S::Payload>>,
    ctx: &FetchContext<'_>,
) -> Result<Option<ValidationOutcome<S::Revision>>, ScmError>
where
    S: Source + ?Sized,
{
    let Some(event) = event else {
        debug!(source = %source.name(), "fetch: full enumeration");
        source.enumerate(observer, ctx)?;
        return Ok(None);
    };

    if !source.matches(event) {
        debug!(
            source = %source.name(),
            event_source = %event.source_name(),
            "fetch: event does not concern this source"
        );
        return Ok(None);
    }

    let kind = event.event().kind();
    let mut validating = ValidatingObserver::new(observer, source, event);
    debug!(
        source = %source.name(),
        %kind,
        claimed = validating.unconfirmed().len(),
        "fetch: event-scoped enumeration"
    );
    if validating.is_observing() {
        source.enumerate(&mut validating, ctx)?;
    }
    Ok(Some(validating.into_outcome()))
}
