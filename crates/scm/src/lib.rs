//! Source-control discovery core.
//!
//! Sources of versioned content (repositories, hosting organisations) report
//! the heads they can see and the revision each head is at. Callers describe
//! what they want to learn with an [`Observer`], possibly composed from the
//! stock observers and [combinators](combinators). Remote systems push
//! [`Event`]s about changes so callers can rescan only what changed, and
//! every such event is confirmed against the source before its data is
//! trusted.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no async runtime and
//! performs no I/O. Providers implement [`Source`]; the `dispatch` crate
//! delivers [`ScmEvent`]s to listeners.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype names (`HeadName`, `SourceName`, etc.) |
//! | [`types`] | `Timestamp` and `Trust` |
//! | [`head`] | `Head`, `HeadKind`, the `Revision` trait, `CommitRevision` |
//! | [`observer`] | The `Observer` trait and the stock observers |
//! | [`combinators`] | `AllFinished`, `OneFinished`, `Filter`, `Wrapped` |
//! | [`event`] | `Event` and the scoped `HeadEvent` / `SourceEvent` / `NavigatorEvent` |
//! | [`source`] | The `Source` contract, `FetchContext`, `fetch` |
//! | [`validating`] | `ValidatingObserver` and `ValidationOutcome` |
//! | [`memory`] | `MemorySource`, an in-process `Source` |
//! | [`errors`] | `ScmError` and `RetryPolicy` |

pub mod combinators;
pub mod errors;
pub mod event;
pub mod head;
pub mod identifiers;
pub mod memory;
pub mod observer;
pub mod source;
pub mod types;
pub mod validating;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use combinators::{AllFinished, Filter, OneFinished, Wrapped};
pub use errors::{RetryPolicy, ScmError};
pub use event::{
    Event, EventField, EventKind, HeadEvent, NavigatorEvent, ScmEvent, SourceEvent,
};
pub use head::{CommitRevision, Head, HeadKind, Revision};
pub use identifiers::{CommitSha, HeadName, NavigatorName, SourceName};
pub use memory::MemorySource;
pub use observer::{Any, Collector, Named, NoneObserver, Observer, Selector};
pub use source::{fetch, report, Criteria, FetchContext, Interrupt, Source};
pub use types::{Timestamp, Trust};
pub use validating::{ValidatingObserver, ValidationOutcome};
