//! Diagnostic naming of the worker currently delivering an event.
//!
//! Blocking-pool threads are anonymous and reused, so a stack dump or a log
//! line from inside a listener cannot say which event it was handling. While
//! an event is delivered, the worker carries a name such as
//! `scm-event-dispatch [HeadEvent @ 2024-05-01T10:00:00+00:00]`; the previous
//! name is restored when the guard drops, whether delivery returns normally or
//! unwinds.

use std::cell::RefCell;
use std::marker::PhantomData;

use scm::ScmEvent;

thread_local! {
    static CURRENT: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Scope guard that names the current worker until dropped.
///
/// Guards nest: dropping an inner guard restores the outer name. The guard is
/// tied to its thread and cannot be sent elsewhere.
#[derive(Debug)]
#[must_use = "the name is restored as soon as the guard is dropped"]
pub struct WorkerName {
    previous: Option<String>,
    _not_send: PhantomData<*const ()>,
}

impl WorkerName {
    /// Names the current worker `name`.
    pub fn set(name: impl Into<String>) -> Self {
        let previous = CURRENT.with(|current| current.replace(Some(name.into())));
        Self {
            previous,
            _not_send: PhantomData,
        }
    }

    /// Names the current worker after `event`, prefixed by `base`.
    pub fn annotate<P>(base: &str, event: &ScmEvent<P>) -> Self {
        Self::set(format!(
            "{base} [{} @ {}]",
            event.class_name(),
            event.event().timestamp()
        ))
    }
}

impl Drop for WorkerName {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| *current.borrow_mut() = previous);
    }
}

/// The diagnostic name of the current worker, if one is set.
pub fn current_worker_name() -> Option<String> {
    CURRENT.with(|current| current.borrow().clone())
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use scm::{Event, EventKind, HeadEvent, SourceName, Timestamp};

    use super::*;

    #[test]
    fn nested_guards_restore_in_order() {
        assert_eq!(current_worker_name(), None);
        {
            let _outer = WorkerName::set("outer");
            {
                let _inner = WorkerName::set("inner");
                assert_eq!(current_worker_name().as_deref(), Some("inner"));
            }
            assert_eq!(current_worker_name().as_deref(), Some("outer"));
        }
        assert_eq!(current_worker_name(), None);
    }

    #[test]
    fn name_is_restored_when_unwinding() {
        let _outer = WorkerName::set("outer");
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _inner = WorkerName::set("inner");
            panic!("listener blew up");
        }));
        assert!(result.is_err());
        assert_eq!(current_worker_name().as_deref(), Some("outer"));
    }

    #[test]
    fn annotation_names_event_class_and_timestamp() {
        let event: ScmEvent<()> = HeadEvent::new(
            SourceName::new("acme/app").unwrap(),
            Event::at(
                EventKind::Updated,
                Timestamp::from_epoch_millis(0).unwrap(),
                (),
            ),
        )
        .into();
        let _guard = WorkerName::annotate("worker", &event);
        assert_eq!(
            current_worker_name().as_deref(),
            Some("worker [HeadEvent @ 1970-01-01T00:00:00+00:00]")
        );
    }
}
