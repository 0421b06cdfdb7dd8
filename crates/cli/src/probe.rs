//! Listener that checks incoming events against the in-process source.
//!
//! Head events trigger a validating fetch: only the pairs the source confirms
//! are logged as facts. Source events addressed to the source trigger a full
//! rescan.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use dispatch::{Listener, ListenerError};
use scm::{
    fetch, Collector, CommitRevision, FetchContext, Head, HeadEvent, MemorySource, ScmError,
    Source, SourceEvent, ValidationOutcome,
};

pub struct Probe {
    source: Arc<MemorySource>,
}

impl Probe {
    pub fn new(source: Arc<MemorySource>) -> Self {
        Self { source }
    }

    /// Confirms the pairs `event` claims. `None` if the event concerns
    /// another source.
    pub fn confirm(
        &self,
        event: &HeadEvent<Value>,
    ) -> Result<Option<ValidationOutcome<CommitRevision>>, ScmError> {
        if !self.source.matches(event) {
            return Ok(None);
        }
        let mut collector = Collector::<CommitRevision>::new();
        fetch(self.source.as_ref(), &mut collector, Some(event), &FetchContext::new())
    }

    pub fn rescan(&self) -> Result<BTreeMap<Head, CommitRevision>, ScmError> {
        let mut collector = Collector::<CommitRevision>::new();
        fetch(self.source.as_ref(), &mut collector, None, &FetchContext::new())?;
        Ok(collector.into_result())
    }
}

fn to_listener_error(err: ScmError) -> ListenerError {
    ListenerError::failed(err.to_string())
}

impl Listener<Value> for Probe {
    fn name(&self) -> &str {
        "probe"
    }

    fn on_head_event(&self, event: &HeadEvent<Value>) -> Result<(), ListenerError> {
        let Some(outcome) = self.confirm(event).map_err(to_listener_error)? else {
            return Ok(());
        };

        if outcome.is_stale() {
            info!(source = %event.source_name(), kind = %event.event().kind(), "event is stale, nothing confirmed");
        }
        for (head, revision) in outcome.confirmed() {
            info!(head = %head, sha = %revision.sha(), "confirmed");
        }
        if !outcome.disputed().is_empty() {
            warn!(
                disputed = ?outcome.disputed().iter().map(|h| h.name().as_str()).collect::<Vec<_>>(),
                origin = event.event().origin().unwrap_or("unknown"),
                "event claims disagree with the source"
            );
        }
        if !outcome.unconfirmed().is_empty() {
            info!(unconfirmed = outcome.unconfirmed().len(), "claims not seen in the source");
        }
        Ok(())
    }

    fn on_source_event(&self, event: &SourceEvent<Value>) -> Result<(), ListenerError> {
        if event.source_name() != self.source.name() {
            return Ok(());
        }
        let heads = self.rescan().map_err(to_listener_error)?;
        info!(source = %event.source_name(), heads = heads.len(), "rescanned");
        Ok(())
    }
}
