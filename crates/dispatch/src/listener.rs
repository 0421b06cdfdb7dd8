//! The listener contract and the registry that holds listeners.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use scm::{HeadEvent, NavigatorEvent, SourceEvent};

use crate::ListenerError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identifies one registration of a listener.
///
/// Generated on [`ListenerRegistry::register`]; the same listener registered
/// twice gets two ids and receives each event twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(Uuid);

impl ListenerId {
    /// Generates a new random identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// Receives dispatched events. Every callback defaults to doing nothing, so
/// implementations override only the scopes they care about.
///
/// Callbacks run on a blocking worker, one listener after another for a given
/// event. They may block, but a slow listener delays the listeners after it.
pub trait Listener<P>: Send + Sync {
    /// Label used when logging failures of this listener.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Called for [`scm::ScmEvent::Head`].
    fn on_head_event(&self, event: &HeadEvent<P>) -> Result<(), ListenerError> {
        let _ = event;
        Ok(())
    }

    /// Called for [`scm::ScmEvent::Source`].
    fn on_source_event(&self, event: &SourceEvent<P>) -> Result<(), ListenerError> {
        let _ = event;
        Ok(())
    }

    /// Called for [`scm::ScmEvent::Navigator`].
    fn on_navigator_event(&self, event: &NavigatorEvent<P>) -> Result<(), ListenerError> {
        let _ = event;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

type Entry<P> = (ListenerId, Arc<dyn Listener<P>>);

/// The set of listeners an event is delivered to.
///
/// Owned by the hosting process and shared with its dispatchers. Delivery
/// iterates a snapshot, so registering or deregistering while events are in
/// flight is safe; an in-flight event may or may not reach a listener added
/// after its delivery started.
pub struct ListenerRegistry<P> {
    listeners: RwLock<Vec<Entry<P>>>,
}

impl<P> ListenerRegistry<P> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Adds `listener` and returns the id to remove it with.
    pub fn register(&self, listener: Arc<dyn Listener<P>>) -> ListenerId {
        let id = ListenerId::new_random();
        debug!(%id, listener = listener.name(), "registering listener");
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    /// Removes the registration `id`. Returns `false` if it was not present.
    pub fn deregister(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        let removed = listeners.len() != before;
        debug!(%id, removed, "deregistering listener");
        removed
    }

    /// Removes every listener. Used at shutdown.
    pub fn clear(&self) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Copy of the current registrations, in registration order.
    pub fn snapshot(&self) -> Vec<Entry<P>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<P> Default for ListenerRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> std::fmt::Debug for ListenerRegistry<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quiet;

    impl Listener<()> for Quiet {}

    #[test]
    fn register_and_deregister() {
        let registry = ListenerRegistry::<()>::new();
        let a = registry.register(Arc::new(Quiet));
        let b = registry.register(Arc::new(Quiet));
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);

        assert!(registry.deregister(a));
        assert!(!registry.deregister(a));
        assert_eq!(registry.snapshot()[0].0, b);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn snapshot_is_unaffected_by_later_changes() {
        let registry = ListenerRegistry::<()>::new();
        let id = registry.register(Arc::new(Quiet));
        let snapshot = registry.snapshot();
        registry.deregister(id);
        assert_eq!(snapshot.len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn default_name_is_the_type_name() {
        assert!(Quiet.name().ends_with("Quiet"));
    }
}
