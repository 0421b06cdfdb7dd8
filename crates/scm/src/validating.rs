//! Confirming what an event claims against what a source reports.
//!
//! An event arriving from outside says "head A is now at r1". That is a rumour
//! until the source itself reports A at some revision. A [`ValidatingObserver`]
//! wraps the caller's observer, looks only for the heads the event mentions,
//! and forwards a pair only when the source reports it. The enumeration stops
//! as soon as every claimed head has been seen, so an event-scoped fetch costs
//! no more than the claim itself.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::{EventKind, Head, HeadEvent, Observer, Revision, ScmError, Source, Trust, Wrapped};

/// Result of an event-scoped enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome<R> {
    kind: EventKind,
    confirmed: BTreeMap<Head, R>,
    unconfirmed: BTreeMap<Head, R>,
    disputed: BTreeSet<Head>,
}

impl<R> ValidationOutcome<R> {
    /// Pairs the source reported for claimed heads, with the source's revision.
    pub fn confirmed(&self) -> &BTreeMap<Head, R> {
        &self.confirmed
    }

    /// Claimed pairs the source never reported.
    pub fn unconfirmed(&self) -> &BTreeMap<Head, R> {
        &self.unconfirmed
    }

    /// Confirmed heads whose claimed revision differed from the source's.
    pub fn disputed(&self) -> &BTreeSet<Head> {
        &self.disputed
    }

    /// `true` when a creation or update event confirmed nothing.
    ///
    /// Callers typically fall back to a full enumeration in that case.
    pub fn is_stale(&self) -> bool {
        matches!(self.kind, EventKind::Created | EventKind::Updated) && self.confirmed.is_empty()
    }

    /// Consumes the outcome and returns the confirmed pairs.
    pub fn into_confirmed(self) -> BTreeMap<Head, R> {
        self.confirmed
    }
}

/// Observer decorator that only lets confirmed event claims through.
#[derive(Debug)]
pub struct ValidatingObserver<O, R> {
    inner: Wrapped<O>,
    kind: EventKind,
    trust: Trust,
    claimed: BTreeMap<Head, R>,
    confirmed: BTreeMap<Head, R>,
    disputed: BTreeSet<Head>,
    includes: BTreeSet<Head>,
}

impl<O, R> ValidatingObserver<O, R>
where
    O: Observer<R>,
    R: Revision,
{
    /// Builds the claim set for `event` as `source` reads it, narrowed to what
    /// `delegate` wants.
    pub fn new<S>(delegate: O, source: &S, event: &HeadEvent<S::Payload>) -> Self
    where
        S: Source<Revision = R> + ?Sized,
    {
        let mut claimed = source.implied_pairs(event);
        if let Some(wanted) = delegate.includes() {
            claimed.retain(|head, _| wanted.contains(head));
        }
        let includes = claimed.keys().cloned().collect();
        Self {
            inner: Wrapped::new(delegate),
            kind: event.event().kind(),
            trust: event.event().payload_trustability(),
            claimed,
            confirmed: BTreeMap::new(),
            disputed: BTreeSet::new(),
            includes,
        }
    }

    /// Claimed pairs still waiting for the source to report them.
    pub fn unconfirmed(&self) -> &BTreeMap<Head, R> {
        &self.claimed
    }

    /// Pairs confirmed so far. Grows monotonically.
    pub fn confirmed(&self) -> &BTreeMap<Head, R> {
        &self.confirmed
    }

    /// The verified view: the only pairs safe to act on directly.
    ///
    /// Same content as [`confirmed`](Self::confirmed); use this accessor in
    /// code paths that must not see unconfirmed claims.
    pub fn trusted(&self) -> &BTreeMap<Head, R> {
        &self.confirmed
    }

    /// Forwards every claim without enumerating, if the event's payload is
    /// trusted. Returns whether anything was accepted.
    ///
    /// This skips the confirmation round-trip entirely. It is only sound when
    /// the transport authenticated the sender; it is never done implicitly.
    pub fn accept_trusted_claims(&mut self) -> Result<bool, ScmError> {
        if !self.trust.is_trusted() {
            debug!("accept_trusted_claims: payload untrusted, confirmation required");
            return Ok(false);
        }
        let mut claims = std::mem::take(&mut self.claimed).into_iter();
        debug!(count = claims.len(), "accept_trusted_claims: accepting trusted claims");
        while let Some((head, revision)) = claims.next() {
            if !self.inner.is_observing() {
                self.claimed.insert(head, revision);
                self.claimed.extend(claims);
                break;
            }
            if let Err(err) = self.inner.observe(head.clone(), revision.clone()) {
                // The failed claim and everything after it stay unconfirmed.
                self.claimed.insert(head, revision);
                self.claimed.extend(claims);
                return Err(err);
            }
            self.confirmed.insert(head, revision);
        }
        Ok(true)
    }

    /// Ends validation and returns what was and was not confirmed.
    pub fn into_outcome(self) -> ValidationOutcome<R> {
        ValidationOutcome {
            kind: self.kind,
            confirmed: self.confirmed,
            unconfirmed: self.claimed,
            disputed: self.disputed,
        }
    }

    /// Unwraps the delegate, discarding validation state.
    pub fn into_inner(self) -> O {
        self.inner.into_inner()
    }
}

impl<O, R> Observer<R> for ValidatingObserver<O, R>
where
    O: Observer<R>,
    R: Revision,
{
    fn observe(&mut self, head: Head, revision: R) -> Result<(), ScmError> {
        let Some(claimed) = self.claimed.remove(&head) else {
            return Ok(());
        };
        if let Err(err) = self.inner.observe(head.clone(), revision.clone()) {
            self.claimed.insert(head, claimed);
            return Err(err);
        }
        if claimed != revision {
            debug!(
                %head,
                claimed = ?claimed,
                reported = ?revision,
                "event claim disagrees with source; keeping source revision"
            );
            self.disputed.insert(head.clone());
        }
        self.confirmed.insert(head, revision);
        Ok(())
    }

    fn is_observing(&self) -> bool {
        !self.claimed.is_empty() && self.inner.is_observing()
    }

    fn includes(&self) -> Option<BTreeSet<Head>> {
        Some(self.includes.clone())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        Collector, CommitRevision, CommitSha, Event, FetchContext, MemorySource, Selector,
        SourceName,
    };

    fn head(name: &str) -> Head {
        Head::branch(name).unwrap()
    }

    fn rev(name: &str, sha: &str) -> CommitRevision {
        CommitRevision::new(head(name), CommitSha::new(sha).unwrap())
    }

    fn source() -> MemorySource {
        let source = MemorySource::new(SourceName::new("acme/app").unwrap());
        source.put(head("a"), CommitSha::new("r1").unwrap());
        source.put(head("c"), CommitSha::new("r9").unwrap());
        source
    }

    fn event(kind: EventKind, heads: serde_json::Value) -> HeadEvent<serde_json::Value> {
        HeadEvent::new(
            SourceName::new("acme/app").unwrap(),
            Event::new(kind, json!({ "heads": heads })),
        )
    }

    #[test]
    fn only_claimed_and_reported_pairs_are_confirmed() {
        let source = source();
        let event = event(EventKind::Updated, json!({"a": "r1", "b": "r2"}));
        let mut collector = Collector::<CommitRevision>::new();
        let mut validating = ValidatingObserver::new(&mut collector, &source, &event);
        assert_eq!(
            validating.includes(),
            Some(BTreeSet::from([head("a"), head("b")]))
        );

        source.enumerate(&mut validating, &FetchContext::new()).unwrap();

        assert_eq!(validating.confirmed().len(), 1);
        assert_eq!(validating.confirmed()[&head("a")], rev("a", "r1"));
        assert!(validating.unconfirmed().contains_key(&head("b")));
        assert!(validating.is_observing());
        drop(validating);

        assert_eq!(collector.result().len(), 1);
    }

    #[test]
    fn claims_are_narrowed_by_delegate_includes() {
        let source = source();
        let event = event(EventKind::Updated, json!({"a": "r1", "b": "r2"}));
        let selector = Selector::<CommitRevision>::new(head("b"));
        let validating = ValidatingObserver::new(selector, &source, &event);
        assert_eq!(validating.includes(), Some(BTreeSet::from([head("b")])));
    }

    #[test]
    fn source_revision_wins_over_claim() {
        let source = source();
        let event = event(EventKind::Updated, json!({"a": "stale"}));
        let mut validating =
            ValidatingObserver::new(Collector::<CommitRevision>::new(), &source, &event);

        source.enumerate(&mut validating, &FetchContext::new()).unwrap();
        assert!(!validating.is_observing());

        let outcome = validating.into_outcome();
        assert_eq!(outcome.confirmed()[&head("a")], rev("a", "r1"));
        assert_eq!(outcome.disputed(), &BTreeSet::from([head("a")]));
        assert!(!outcome.is_stale());
    }

    #[test]
    fn stops_when_delegate_stops() {
        let source = source();
        let event = event(EventKind::Updated, json!({"a": "r1", "c": "r9"}));
        let mut validating =
            ValidatingObserver::new(crate::Any::<CommitRevision>::new(), &source, &event);
        validating.observe(head("a"), rev("a", "r1")).unwrap();
        assert!(!validating.is_observing());
    }

    #[test]
    fn untrusted_claims_are_never_accepted_blindly() {
        let source = source();
        let event = event(EventKind::Created, json!({"b": "r2"}));
        let mut validating =
            ValidatingObserver::new(Collector::<CommitRevision>::new(), &source, &event);

        assert!(!validating.accept_trusted_claims().unwrap());
        assert!(validating.trusted().is_empty());
        assert!(validating.into_outcome().is_stale());
    }

    #[test]
    fn trusted_claims_can_skip_enumeration_on_request() {
        let source = source();
        let event = HeadEvent::new(
            SourceName::new("acme/app").unwrap(),
            Event::new(EventKind::Created, json!({"heads": {"b": "r2"}}))
                .with_payload_trust(Trust::Trusted),
        );
        let mut validating =
            ValidatingObserver::new(Collector::<CommitRevision>::new(), &source, &event);

        assert!(validating.accept_trusted_claims().unwrap());
        assert_eq!(validating.trusted()[&head("b")], rev("b", "r2"));
        assert!(!validating.is_observing());
        assert_eq!(validating.into_inner().result().len(), 1);
    }

    /// Accepts everything except one head, which it refuses.
    struct RefusesHead {
        refused: Head,
        seen: Vec<Head>,
    }

    impl Observer<CommitRevision> for RefusesHead {
        fn observe(&mut self, head: Head, _revision: CommitRevision) -> Result<(), ScmError> {
            if head == self.refused {
                return Err(ScmError::Aborted {
                    reason: format!("refusing {head}"),
                });
            }
            self.seen.push(head);
            Ok(())
        }

        fn is_observing(&self) -> bool {
            true
        }
    }

    fn refusing(name: &str) -> RefusesHead {
        RefusesHead {
            refused: head(name),
            seen: Vec::new(),
        }
    }

    #[test]
    fn failed_trusted_claim_and_the_rest_stay_unconfirmed() {
        let source = source();
        let event = HeadEvent::new(
            SourceName::new("acme/app").unwrap(),
            Event::new(
                EventKind::Updated,
                json!({"heads": {"a": "r1", "b": "r2", "c": "r3"}}),
            )
            .with_payload_trust(Trust::Trusted),
        );
        let mut validating = ValidatingObserver::new(refusing("b"), &source, &event);

        let err = validating.accept_trusted_claims().unwrap_err();
        assert!(matches!(err, ScmError::Aborted { .. }));

        assert_eq!(validating.confirmed().keys().collect::<Vec<_>>(), [&head("a")]);
        assert_eq!(
            validating.unconfirmed().keys().collect::<Vec<_>>(),
            [&head("b"), &head("c")]
        );
        assert!(validating.is_observing());
        assert_eq!(validating.into_inner().seen, [head("a")]);
    }

    #[test]
    fn failed_delegate_leaves_the_claim_unconfirmed() {
        let source = source();
        let event = event(EventKind::Updated, json!({"a": "stale", "c": "r9"}));
        let mut validating = ValidatingObserver::new(refusing("a"), &source, &event);

        assert!(validating.observe(head("a"), rev("a", "r1")).is_err());
        validating.observe(head("c"), rev("c", "r9")).unwrap();

        let outcome = validating.into_outcome();
        assert_eq!(outcome.confirmed().keys().collect::<Vec<_>>(), [&head("c")]);
        assert_eq!(outcome.unconfirmed().keys().collect::<Vec<_>>(), [&head("a")]);
        assert!(outcome.disputed().is_empty());
    }
}
