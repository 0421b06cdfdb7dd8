//! Notifications about created, updated or removed heads, sources and owners.
//!
//! An [`Event`] is immutable once built. It carries what happened
//! ([`EventKind`]), when it happened ([`Timestamp`]) and whatever the origin
//! system sent ([`Event::payload`]). Everything in it is hearsay unless the
//! transport vouched for it: see [`Event::payload_trustability`].
//!
//! Events are scoped by what they concern:
//!
//! | Scope | Type | Addressed by |
//! |-------|------|--------------|
//! | Heads of one source | [`HeadEvent`] | [`SourceName`] |
//! | A source as a whole | [`SourceEvent`] | [`SourceName`] |
//! | An owner of many sources | [`NavigatorEvent`] | [`NavigatorName`] |
//!
//! [`ScmEvent`] is the closed sum of the three and is what dispatchers carry.
//!
//! Equality and hashing of [`Event`] are structural over kind, timestamp and
//! payload. The origin is a diagnostic annotation and does not participate.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::{NavigatorName, SourceName, Timestamp, Trust};

// ---------------------------------------------------------------------------
// Kinds and fields
// ---------------------------------------------------------------------------

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Something new appeared.
    Created,
    /// Something existing changed.
    Updated,
    /// Something went away.
    Removed,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Removed => "REMOVED",
        };
        f.write_str(s)
    }
}

/// The logical fields of an event that carry a trust annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventField {
    /// [`Event::kind`].
    Kind,
    /// [`Event::timestamp`].
    Timestamp,
    /// [`Event::payload`].
    Payload,
    /// [`Event::origin`].
    Origin,
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// An immutable notification from an external system.
#[derive(Debug, Clone)]
pub struct Event<P> {
    kind: EventKind,
    timestamp: Timestamp,
    payload: P,
    origin: Option<String>,
    payload_trust: Trust,
}

impl<P> Event<P> {
    /// Creates an event stamped with the current time.
    ///
    /// Use when the origin system does not supply a timestamp of its own.
    pub fn new(kind: EventKind, payload: P) -> Self {
        Self::at(kind, Timestamp::now(), payload)
    }

    /// Creates an event with the timestamp supplied by the origin system.
    pub fn at(kind: EventKind, timestamp: Timestamp, payload: P) -> Self {
        Self {
            kind,
            timestamp,
            payload,
            origin: None,
            payload_trust: Trust::Untrusted,
        }
    }

    /// Annotates the event with where it came from (host, address, relay).
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Marks the payload as verified by the transport.
    ///
    /// Only adapters whose transport authenticates the sender (for example an
    /// HMAC-signed webhook whose signature was checked) should pass
    /// [`Trust::Trusted`]. Even then a source only skips confirmation when the
    /// caller explicitly asks it to.
    #[must_use]
    pub fn with_payload_trust(mut self, trust: Trust) -> Self {
        self.payload_trust = trust;
        self
    }

    /// What happened.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// When it happened, according to the origin if it said so.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// The provider-specific payload.
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Where the event came from, if known.
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Trust of the payload as a whole.
    pub fn payload_trustability(&self) -> Trust {
        self.payload_trust
    }

    /// `true` iff [`payload_trustability`](Self::payload_trustability) is
    /// [`Trust::Trusted`].
    pub fn is_payload_trusted(&self) -> bool {
        self.payload_trust.is_trusted()
    }

    /// Trust of a single logical field.
    ///
    /// Kind, timestamp and payload all derive from what the origin sent and
    /// share the payload's trust. The origin annotation is never trusted.
    pub fn trust_of(&self, field: EventField) -> Trust {
        match field {
            EventField::Kind | EventField::Timestamp | EventField::Payload => self.payload_trust,
            EventField::Origin => Trust::Untrusted,
        }
    }
}

impl<P: PartialEq> PartialEq for Event<P> {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.timestamp == other.timestamp && self.payload == other.payload
    }
}

impl<P: Eq> Eq for Event<P> {}

impl<P: Hash> Hash for Event<P> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.timestamp.hash(state);
        self.payload.hash(state);
    }
}

// ---------------------------------------------------------------------------
// Scoped events
// ---------------------------------------------------------------------------

/// An event about heads of one source: a push, a new tag, a closed change
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeadEvent<P> {
    source: SourceName,
    event: Event<P>,
}

impl<P> HeadEvent<P> {
    /// Scopes `event` to the source called `source`.
    pub fn new(source: SourceName, event: Event<P>) -> Self {
        Self { source, event }
    }

    /// The source the event claims to concern.
    pub fn source_name(&self) -> &SourceName {
        &self.source
    }

    /// The underlying event.
    pub fn event(&self) -> &Event<P> {
        &self.event
    }
}

/// An event about a source as a whole: a repository created, renamed or
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceEvent<P> {
    source: SourceName,
    event: Event<P>,
}

impl<P> SourceEvent<P> {
    /// Scopes `event` to the source called `source`.
    pub fn new(source: SourceName, event: Event<P>) -> Self {
        Self { source, event }
    }

    /// The source the event claims to concern.
    pub fn source_name(&self) -> &SourceName {
        &self.source
    }

    /// The underlying event.
    pub fn event(&self) -> &Event<P> {
        &self.event
    }
}

/// An event about an owner of many sources: an organisation renamed, a
/// repository added to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NavigatorEvent<P> {
    navigator: NavigatorName,
    event: Event<P>,
}

impl<P> NavigatorEvent<P> {
    /// Scopes `event` to the owner called `navigator`.
    pub fn new(navigator: NavigatorName, event: Event<P>) -> Self {
        Self { navigator, event }
    }

    /// The owner the event claims to concern.
    pub fn navigator_name(&self) -> &NavigatorName {
        &self.navigator
    }

    /// The underlying event.
    pub fn event(&self) -> &Event<P> {
        &self.event
    }
}

/// Any scoped event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScmEvent<P> {
    /// See [`HeadEvent`].
    Head(HeadEvent<P>),
    /// See [`SourceEvent`].
    Source(SourceEvent<P>),
    /// See [`NavigatorEvent`].
    Navigator(NavigatorEvent<P>),
}

impl<P> ScmEvent<P> {
    /// The underlying event regardless of scope.
    pub fn event(&self) -> &Event<P> {
        match self {
            Self::Head(e) => e.event(),
            Self::Source(e) => e.event(),
            Self::Navigator(e) => e.event(),
        }
    }

    /// Short name of the scope, used to label diagnostics.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Head(_) => "HeadEvent",
            Self::Source(_) => "SourceEvent",
            Self::Navigator(_) => "NavigatorEvent",
        }
    }

    /// Name of whatever the event concerns.
    pub fn subject(&self) -> &str {
        match self {
            Self::Head(e) => e.source_name().as_str(),
            Self::Source(e) => e.source_name().as_str(),
            Self::Navigator(e) => e.navigator_name().as_str(),
        }
    }
}

impl<P> From<HeadEvent<P>> for ScmEvent<P> {
    fn from(e: HeadEvent<P>) -> Self {
        Self::Head(e)
    }
}

impl<P> From<SourceEvent<P>> for ScmEvent<P> {
    fn from(e: SourceEvent<P>) -> Self {
        Self::Source(e)
    }
}

impl<P> From<NavigatorEvent<P>> for ScmEvent<P> {
    fn from(e: NavigatorEvent<P>) -> Self {
        Self::Navigator(e)
    }
}

impl<P> std::fmt::Display for ScmEvent<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let event = self.event();
        write!(
            f,
            "{} {} '{}' at {}",
            self.class_name(),
            event.kind(),
            self.subject(),
            event.timestamp()
        )?;
        if let Some(origin) = event.origin() {
            write!(f, " from {origin}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;

    use serde_json::json;

    use super::*;

    fn ts(millis: i64) -> Timestamp {
        Timestamp::from_epoch_millis(millis).unwrap()
    }

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn structurally_equal_events_hash_alike() {
        let a = Event::at(EventKind::Updated, ts(1_000), json!({"ref": "main"}));
        let b = Event::at(EventKind::Updated, ts(1_000), json!({"ref": "main"}))
            .with_origin("10.0.0.1");
        assert_eq!(a, b);

        let a = Event::at(EventKind::Updated, ts(1_000), "main".to_string());
        let b = Event::at(EventKind::Updated, ts(1_000), "main".to_string());
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn any_field_change_breaks_equality() {
        let base = Event::at(EventKind::Created, ts(5), "p".to_string());
        assert_ne!(base, Event::at(EventKind::Removed, ts(5), "p".to_string()));
        assert_ne!(base, Event::at(EventKind::Created, ts(6), "p".to_string()));
        assert_ne!(base, Event::at(EventKind::Created, ts(5), "q".to_string()));
    }

    #[test]
    fn origin_timestamp_is_preserved() {
        let event = Event::at(EventKind::Created, ts(42), ());
        assert_eq!(event.timestamp().as_epoch_millis(), 42);
    }

    #[test]
    fn payloads_are_untrusted_by_default() {
        let event = Event::new(EventKind::Updated, ());
        assert!(!event.is_payload_trusted());
        assert_eq!(event.trust_of(EventField::Payload), Trust::Untrusted);

        let trusted = event.with_payload_trust(Trust::Trusted).with_origin("hook");
        assert!(trusted.is_payload_trusted());
        assert_eq!(trusted.trust_of(EventField::Timestamp), Trust::Trusted);
        assert_eq!(trusted.trust_of(EventField::Origin), Trust::Untrusted);
    }

    #[test]
    fn scoped_events_describe_themselves() {
        let source = SourceName::new("acme/widgets").unwrap();
        let event: ScmEvent<()> =
            HeadEvent::new(source, Event::at(EventKind::Updated, ts(0), ())).into();
        assert_eq!(event.class_name(), "HeadEvent");
        assert_eq!(
            event.to_string(),
            "HeadEvent UPDATED 'acme/widgets' at 1970-01-01T00:00:00+00:00"
        );

        let owner = NavigatorName::new("acme").unwrap();
        let event: ScmEvent<()> =
            NavigatorEvent::new(owner, Event::at(EventKind::Removed, ts(0), ()).with_origin("gh"))
                .into();
        assert_eq!(event.subject(), "acme");
        assert!(event.to_string().ends_with(" from gh"));
    }
}
