//! Events read from stdin, one JSON object per line.
//!
//! ```json
//! {"scope": "head", "subject": "acme/widgets", "kind": "updated",
//!  "payload": {"heads": {"master": "r11"}}, "origin": "10.0.0.7", "delay_ms": 500}
//! ```
//!
//! `payload`, `origin`, `trusted` and `delay_ms` are optional. Nothing read
//! here is trusted unless the line says so.

use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

use scm::{
    Event, EventKind, HeadEvent, NavigatorEvent, NavigatorName, ScmEvent, SourceEvent, SourceName,
    Trust,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Head,
    Source,
    Navigator,
}

#[derive(Debug, Deserialize)]
pub struct EventLine {
    scope: Scope,
    subject: String,
    kind: EventKind,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    origin: Option<String>,
    #[serde(default)]
    trusted: bool,
    #[serde(default)]
    delay_ms: Option<u64>,
}

impl EventLine {
    pub fn parse(line: &str) -> anyhow::Result<Self> {
        serde_json::from_str(line).context("malformed event line")
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay_ms.map(Duration::from_millis)
    }

    pub fn into_event(self) -> anyhow::Result<ScmEvent<Value>> {
        let trust = if self.trusted {
            Trust::Trusted
        } else {
            Trust::Untrusted
        };
        let mut event = Event::new(self.kind, self.payload).with_payload_trust(trust);
        if let Some(origin) = self.origin {
            event = event.with_origin(origin);
        }

        let event = match self.scope {
            Scope::Head => HeadEvent::new(source_name(self.subject)?, event).into(),
            Scope::Source => SourceEvent::new(source_name(self.subject)?, event).into(),
            Scope::Navigator => {
                let name = NavigatorName::new(self.subject).context("navigator name is empty")?;
                NavigatorEvent::new(name, event).into()
            }
        };
        Ok(event)
    }
}

fn source_name(subject: String) -> anyhow::Result<SourceName> {
    SourceName::new(subject).context("source name is empty")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn head_line_with_everything() {
        let line = EventLine::parse(
            r#"{"scope": "head", "subject": "acme/widgets", "kind": "updated",
                "payload": {"heads": {"master": "r11"}}, "origin": "10.0.0.7",
                "trusted": true, "delay_ms": 500}"#,
        )
        .unwrap();
        assert_eq!(line.delay(), Some(Duration::from_millis(500)));

        let ScmEvent::Head(event) = line.into_event().unwrap() else {
            panic!("expected a head event");
        };
        assert_eq!(event.source_name().as_str(), "acme/widgets");
        assert_eq!(event.event().kind(), EventKind::Updated);
        assert_eq!(event.event().origin(), Some("10.0.0.7"));
        assert!(event.event().is_payload_trusted());
        assert_eq!(event.event().payload(), &json!({"heads": {"master": "r11"}}));
    }

    #[test]
    fn minimal_navigator_line_is_untrusted() {
        let line =
            EventLine::parse(r#"{"scope": "navigator", "subject": "acme", "kind": "removed"}"#)
                .unwrap();
        assert_eq!(line.delay(), None);

        let event = line.into_event().unwrap();
        assert_eq!(event.class_name(), "NavigatorEvent");
        assert_eq!(event.subject(), "acme");
        assert!(!event.event().is_payload_trusted());
        assert_eq!(event.event().payload(), &Value::Null);
    }

    #[test]
    fn rejects_bad_lines() {
        assert!(EventLine::parse("not json").is_err());
        assert!(EventLine::parse(r#"{"scope": "repo", "subject": "a", "kind": "created"}"#).is_err());

        let empty_subject =
            EventLine::parse(r#"{"scope": "source", "subject": "", "kind": "created"}"#).unwrap();
        assert!(empty_subject.into_event().is_err());
    }
}
