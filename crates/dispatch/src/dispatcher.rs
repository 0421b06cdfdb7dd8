//! Asynchronous delivery of events to the listeners in a registry.
//!
//! Each fired event becomes one task. The task snapshots the registry and
//! calls the matching callback of every listener in turn on a blocking
//! worker, so listeners are free to do blocking work. Independent events run
//! on independent tasks and may interleave.
//!
//! # Failure handling
//!
//! | Listener outcome          | Effect                                         |
//! |---------------------------|------------------------------------------------|
//! | `Ok(())`                  | counted as delivered                           |
//! | `Err(Failed)` or a panic  | logged at warn, delivery continues             |
//! | `Err(Fatal)`              | logged at error, remaining listeners skipped   |
//!
//! The outcome is returned as a [`DeliveryReport`] through the task's
//! [`JoinHandle`]; callers that fire and forget can drop the handle.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, debug_span, error, info, warn};

use scm::ScmEvent;

use crate::config::{DispatcherConfig, PoolConfig};
use crate::listener::{Listener, ListenerId, ListenerRegistry};
use crate::worker_name::WorkerName;
use crate::{DispatchError, ListenerError};

// ---------------------------------------------------------------------------
// DeliveryReport
// ---------------------------------------------------------------------------

/// What happened when one event was delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Listeners whose callback was invoked.
    pub attempted: usize,
    /// Listeners whose callback returned `Ok`.
    pub delivered: usize,
    /// Listeners whose callback failed or panicked, in invocation order.
    pub failed: Vec<ListenerId>,
    /// `true` if delivery stopped before every listener was attempted.
    pub aborted: bool,
}

impl DeliveryReport {
    /// Every listener was attempted and none failed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.aborted
    }

    fn cancelled() -> Self {
        Self {
            aborted: true,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Schedules delivery of events to a [`ListenerRegistry`].
pub struct Dispatcher<P> {
    registry: Arc<ListenerRegistry<P>>,
    worker_name: Arc<str>,
    handle: Handle,
    runtime: Option<Runtime>,
}

impl<P> Dispatcher<P>
where
    P: Send + Sync + 'static,
{
    /// Creates a dispatcher for `registry` using the pool selected by
    /// `config`.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::ConfigurationError`] if `config` is invalid.
    /// - [`DispatchError::NoRuntime`] for a shared pool outside a tokio
    ///   runtime.
    /// - [`DispatchError::RuntimeStartup`] if a dedicated pool cannot start.
    pub fn new(
        config: DispatcherConfig,
        registry: Arc<ListenerRegistry<P>>,
    ) -> Result<Self, DispatchError> {
        config.validate()?;
        match config.pool {
            PoolConfig::Shared => {
                let handle = Handle::try_current().map_err(|_| DispatchError::NoRuntime)?;
                Self::with_handle(handle, config, registry)
            }
            PoolConfig::Dedicated { worker_threads } => {
                let runtime = Builder::new_multi_thread()
                    .worker_threads(worker_threads)
                    .thread_name(config.worker_name.clone())
                    .enable_all()
                    .build()
                    .map_err(DispatchError::RuntimeStartup)?;
                info!(
                    worker_name = %config.worker_name,
                    worker_threads,
                    "started dedicated dispatch pool"
                );
                let mut dispatcher = Self::with_handle(runtime.handle().clone(), config, registry)?;
                dispatcher.runtime = Some(runtime);
                Ok(dispatcher)
            }
        }
    }

    /// Creates a dispatcher with its own pool of `worker_threads` threads.
    pub fn dedicated(
        registry: Arc<ListenerRegistry<P>>,
        worker_threads: usize,
    ) -> Result<Self, DispatchError> {
        let config = DispatcherConfig {
            pool: PoolConfig::Dedicated { worker_threads },
            ..DispatcherConfig::default()
        };
        Self::new(config, registry)
    }

    /// Creates a dispatcher that schedules on `handle`. The pool selection in
    /// `config` is ignored.
    pub fn with_handle(
        handle: Handle,
        config: DispatcherConfig,
        registry: Arc<ListenerRegistry<P>>,
    ) -> Result<Self, DispatchError> {
        config.validate()?;
        Ok(Self {
            registry,
            worker_name: Arc::from(config.worker_name),
            handle,
            runtime: None,
        })
    }

    /// The registry events are delivered to.
    pub fn registry(&self) -> &Arc<ListenerRegistry<P>> {
        &self.registry
    }

    /// The runtime delivery tasks are spawned on.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Schedules delivery of `event` and returns immediately.
    pub fn fire_now(&self, event: impl Into<ScmEvent<P>>) -> JoinHandle<DeliveryReport> {
        let event = event.into();
        debug!(event = %event, "scheduling delivery");
        let registry = Arc::clone(&self.registry);
        let base = Arc::clone(&self.worker_name);
        self.handle
            .spawn_blocking(move || deliver(&base, &registry, &event))
    }

    /// Schedules delivery of `event` once `delay` has elapsed and returns
    /// immediately.
    ///
    /// Aborting the returned handle before the delay elapses cancels
    /// delivery; once delivery has started it runs to completion.
    pub fn fire_later(
        &self,
        event: impl Into<ScmEvent<P>>,
        delay: Duration,
    ) -> JoinHandle<DeliveryReport> {
        let event = event.into();
        debug!(event = %event, ?delay, "scheduling delayed delivery");
        let registry = Arc::clone(&self.registry);
        let base = Arc::clone(&self.worker_name);
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let delivery = tokio::task::spawn_blocking(move || deliver(&base, &registry, &event));
            match delivery.await {
                Ok(report) => report,
                Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
                Err(_) => DeliveryReport::cancelled(),
            }
        })
    }

    /// Stops an owned pool, waiting up to `timeout` for running deliveries.
    ///
    /// A dispatcher on a shared runtime has nothing to stop. Must not be
    /// called from within an async context; drop the dispatcher there
    /// instead.
    pub fn shutdown(mut self, timeout: Duration) {
        if let Some(runtime) = self.runtime.take() {
            info!(worker_name = %self.worker_name, "stopping dedicated dispatch pool");
            runtime.shutdown_timeout(timeout);
        }
    }
}

impl<P> Drop for Dispatcher<P> {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl<P> std::fmt::Debug for Dispatcher<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("worker_name", &self.worker_name)
            .field("dedicated", &self.runtime.is_some())
            .field("listeners", &self.registry.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

fn deliver<P>(base: &str, registry: &ListenerRegistry<P>, event: &ScmEvent<P>) -> DeliveryReport {
    let _name = WorkerName::annotate(base, event);
    let span = debug_span!("deliver", event = %event);
    let _entered = span.enter();

    let mut report = DeliveryReport::default();
    for (id, listener) in registry.snapshot() {
        report.attempted += 1;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| invoke(listener.as_ref(), event)));
        match outcome {
            Ok(Ok(())) => report.delivered += 1,
            Ok(Err(err @ ListenerError::Fatal { .. })) => {
                error!(
                    listener = listener.name(),
                    listener_id = %id,
                    error = %err,
                    "listener failed fatally, skipping remaining listeners"
                );
                report.failed.push(id);
                report.aborted = true;
                break;
            }
            Ok(Err(err)) => {
                warn!(
                    listener = listener.name(),
                    listener_id = %id,
                    error = %err,
                    "listener failed"
                );
                report.failed.push(id);
            }
            Err(payload) => {
                warn!(
                    listener = listener.name(),
                    listener_id = %id,
                    panic = panic_message(payload.as_ref()),
                    "listener panicked"
                );
                report.failed.push(id);
            }
        }
    }

    debug!(
        attempted = report.attempted,
        delivered = report.delivered,
        failed = report.failed.len(),
        aborted = report.aborted,
        "delivery finished"
    );
    report
}

fn invoke<P>(listener: &dyn Listener<P>, event: &ScmEvent<P>) -> Result<(), ListenerError> {
    match event {
        ScmEvent::Head(e) => listener.on_head_event(e),
        ScmEvent::Source(e) => listener.on_source_event(e),
        ScmEvent::Navigator(e) => listener.on_navigator_event(e),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_reads_string_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");

        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn clean_report() {
        assert!(DeliveryReport::default().is_clean());
        assert!(!DeliveryReport::cancelled().is_clean());
    }

    #[test]
    fn shared_pool_needs_a_runtime() {
        let registry = Arc::new(ListenerRegistry::<()>::new());
        let result = Dispatcher::new(DispatcherConfig::default(), registry);
        assert!(matches!(result, Err(DispatchError::NoRuntime)));
    }
}
