//! A [`Source`] backed by an in-process map.
//!
//! Used by tests and by the CLI to exercise the full observer and event
//! machinery without a version-control backend. Heads are added and removed
//! at runtime; enumeration takes a snapshot so observers never run under the
//! lock.
//!
//! Events for this source carry a JSON payload of the form
//! `{"heads": {"<head>": "<sha>" | null}}`. A `null` revision means the head
//! was deleted and implies nothing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::Deserialize;
use tracing::{debug, trace};

use crate::{
    report, CommitRevision, CommitSha, FetchContext, Head, HeadEvent, Observer, ScmError, Source,
    SourceName,
};

#[derive(Debug, Deserialize)]
struct HeadsPayload {
    heads: BTreeMap<String, Option<String>>,
}

/// In-memory source of commit revisions.
#[derive(Debug)]
pub struct MemorySource {
    name: SourceName,
    heads: RwLock<BTreeMap<Head, CommitRevision>>,
    unavailable: AtomicBool,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new(name: SourceName) -> Self {
        Self {
            name,
            heads: RwLock::new(BTreeMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Points `head` at `sha`, returning the previous revision if any.
    pub fn put(&self, head: Head, sha: CommitSha) -> Option<CommitRevision> {
        let revision = CommitRevision::new(head.clone(), sha);
        self.heads
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(head, revision)
    }

    /// Deletes `head`, returning its last revision if it existed.
    pub fn remove(&self, head: &Head) -> Option<CommitRevision> {
        self.heads
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(head)
    }

    /// Makes enumeration fail with an I/O error until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of heads currently present.
    pub fn len(&self) -> usize {
        self.heads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no heads are present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<(Head, CommitRevision)> {
        self.heads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(h, r)| (h.clone(), r.clone()))
            .collect()
    }
}

impl Source for MemorySource {
    type Revision = CommitRevision;
    type Payload = serde_json::Value;

    fn name(&self) -> &SourceName {
        &self.name
    }

    fn enumerate(
        &self,
        observer: &mut dyn Observer<CommitRevision>,
        ctx: &FetchContext<'_>,
    ) -> Result<(), ScmError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ScmError::io(
                self.name.as_str(),
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "source unavailable"),
            ));
        }

        let wanted = observer.includes();
        let mut reported = 0usize;
        for (head, revision) in self.snapshot() {
            ctx.check_interrupted()?;
            if !observer.is_observing() {
                break;
            }
            if wanted.as_ref().is_some_and(|w| !w.contains(&head)) {
                continue;
            }
            if !ctx.accepts(&head) {
                trace!(%head, "criteria rejected head");
                continue;
            }
            report(&mut *observer, head, revision)?;
            reported += 1;
        }
        debug!(source = %self.name, reported, "enumeration finished");
        Ok(())
    }

    fn implied_pairs(&self, event: &HeadEvent<serde_json::Value>) -> BTreeMap<Head, CommitRevision> {
        let payload: HeadsPayload = match serde_json::from_value(event.event().payload().clone()) {
            Ok(p) => p,
            Err(e) => {
                debug!(source = %self.name, error = %e, "unreadable event payload implies nothing");
                return BTreeMap::new();
            }
        };

        payload
            .heads
            .into_iter()
            .filter_map(|(name, sha)| {
                let head = Head::branch(name)?;
                let sha = CommitSha::new(sha?)?;
                Some((head.clone(), CommitRevision::new(head, sha)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{Collector, Event, EventKind, Interrupt, Selector};

    fn head(name: &str) -> Head {
        Head::branch(name).unwrap()
    }

    fn seeded() -> MemorySource {
        let source = MemorySource::new(SourceName::new("acme/app").unwrap());
        for (name, sha) in [("a", "1"), ("b", "2"), ("c", "3")] {
            source.put(head(name), CommitSha::new(sha).unwrap());
        }
        source
    }

    #[test]
    fn enumerates_everything_into_a_collector() {
        let source = seeded();
        let mut collector = Collector::<CommitRevision>::new();
        source.enumerate(&mut collector, &FetchContext::new()).unwrap();
        assert_eq!(collector.result().len(), 3);
    }

    #[test]
    fn honours_includes_and_termination() {
        let source = seeded();
        let mut selector = Selector::<CommitRevision>::new(head("b"));
        source.enumerate(&mut selector, &FetchContext::new()).unwrap();
        assert_eq!(selector.result().map(|r| r.sha().as_str()), Some("2"));
    }

    #[test]
    fn applies_criteria() {
        let source = seeded();
        let not_b = |h: &Head| h.name().as_str() != "b";
        let mut collector = Collector::<CommitRevision>::new();
        source
            .enumerate(&mut collector, &FetchContext::new().with_criteria(&not_b))
            .unwrap();
        assert!(!collector.result().contains_key(&head("b")));
        assert_eq!(collector.result().len(), 2);
    }

    #[test]
    fn raised_interrupt_aborts() {
        let source = seeded();
        let interrupt = Interrupt::new();
        interrupt.raise();
        let mut collector = Collector::<CommitRevision>::new();
        let err = source
            .enumerate(&mut collector, &FetchContext::new().with_interrupt(interrupt))
            .unwrap_err();
        assert!(err.is_interrupted());
        assert!(collector.result().is_empty());
    }

    #[test]
    fn unavailable_source_reports_io_error() {
        let source = seeded();
        source.set_unavailable(true);
        let mut collector = Collector::<CommitRevision>::new();
        let err = source
            .enumerate(&mut collector, &FetchContext::new())
            .unwrap_err();
        assert!(matches!(err, ScmError::Io { .. }));
    }

    #[test]
    fn removed_heads_and_null_revisions_imply_nothing() {
        let source = seeded();
        assert!(source.remove(&head("c")).is_some());
        assert_eq!(source.len(), 2);

        let event = HeadEvent::new(
            SourceName::new("acme/app").unwrap(),
            Event::new(EventKind::Removed, json!({"heads": {"c": null, "a": "1"}})),
        );
        let implied = source.implied_pairs(&event);
        assert_eq!(implied.keys().collect::<Vec<_>>(), [&head("a")]);

        let garbage = HeadEvent::new(
            SourceName::new("acme/app").unwrap(),
            Event::new(EventKind::Updated, json!(["not", "an", "object"])),
        );
        assert!(source.implied_pairs(&garbage).is_empty());
    }
}
