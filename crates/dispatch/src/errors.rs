//! Listener and dispatcher error types.

use thiserror::Error;

use scm::RetryPolicy;

/// Failure reported by a listener callback.
///
/// [`ListenerError::Failed`] is contained: it is logged and delivery moves on
/// to the next listener. [`ListenerError::Fatal`] is the unrecoverable kind and
/// stops delivery of that one event to any remaining listeners.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ListenerError {
    /// The listener could not handle the event.
    #[error("listener failed: {message}")]
    Failed {
        /// Human-readable description of the failure.
        message: String,
    },

    /// The listener hit a condition that makes further delivery pointless.
    #[error("listener failed fatally: {message}")]
    Fatal {
        /// Human-readable description of the failure.
        message: String,
    },
}

impl ListenerError {
    /// A contained failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// An unrecoverable failure.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    /// Returns `true` for [`ListenerError::Fatal`].
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

/// Errors constructing or running a [`crate::Dispatcher`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The configuration is unusable.
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Description of the configuration problem.
        message: String,
    },

    /// A shared pool was requested outside a tokio runtime.
    #[error("No tokio runtime available for the shared dispatch pool")]
    NoRuntime,

    /// The dedicated pool could not be started.
    #[error("Failed to start dedicated dispatch pool: {0}")]
    RuntimeStartup(#[source] std::io::Error),
}

impl DispatchError {
    /// Returns whether constructing the dispatcher again may succeed.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::RuntimeStartup(_) => RetryPolicy::Retryable { after: None },
            Self::ConfigurationError { .. } | Self::NoRuntime => RetryPolicy::NonRetryable,
        }
    }
}
