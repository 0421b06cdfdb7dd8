//! Asynchronous delivery of source-control events to registered listeners.
//!
//! Hosts build a [`ListenerRegistry`], register [`Listener`]s, and hand the
//! registry to a [`Dispatcher`]. Whatever receives events from the outside
//! world (a webhook adapter, a queue consumer, a poller) wraps them in a
//! [`scm::ScmEvent`] and calls [`Dispatcher::fire_now`] or
//! [`Dispatcher::fire_later`]; both return immediately.
//!
//! ## Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | [`DispatcherConfig`], [`PoolConfig`] |
//! | [`dispatcher`] | [`Dispatcher`], [`DeliveryReport`] |
//! | [`errors`] | [`ListenerError`], [`DispatchError`] |
//! | [`listener`] | [`Listener`], [`ListenerRegistry`], [`ListenerId`] |
//! | [`worker_name`] | [`WorkerName`], [`current_worker_name`] |
//!
//! ## Guarantees
//!
//! - One event is one task; its listeners are invoked one after another.
//! - Separate events are delivered independently and may run concurrently.
//! - A failing or panicking listener does not prevent the others from seeing
//!   the event, unless it reports [`ListenerError::Fatal`].
//! - No ordering across listeners is promised beyond registration order
//!   within one delivery.

pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod listener;
pub mod worker_name;

pub use config::{DispatcherConfig, PoolConfig, DEFAULT_WORKER_NAME};
pub use dispatcher::{DeliveryReport, Dispatcher};
pub use errors::{DispatchError, ListenerError};
pub use listener::{Listener, ListenerId, ListenerRegistry};
pub use worker_name::{current_worker_name, WorkerName};
