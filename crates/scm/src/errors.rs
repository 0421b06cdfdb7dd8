//! Error and retry-policy types for source enumeration.
//!
//! [`ScmError`] is returned from every operation that talks to a
//! [`crate::Source`] or feeds an [`crate::Observer`]. Its variants are
//! distinguishable so callers can tell an I/O failure (maybe retry) from an
//! interruption (stop) from a provider bug (report).
//!
//! [`RetryPolicy`] lets the caller decide whether to re-run an enumeration
//! without inspecting each variant itself.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Head;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// What a failed enumeration says about running it again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// Re-running the enumeration may succeed.
    Retryable {
        /// Wait hinted by the provider. With `None` the caller's own
        /// schedule applies.
        after: Option<Duration>,
    },
    /// Re-running would fail the same way, or the caller asked to stop.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Enumeration errors
// ---------------------------------------------------------------------------

/// Errors raised while a source enumerates heads into an observer.
#[derive(Debug, Error)]
pub enum ScmError {
    /// The source could not reach its backing store.
    #[error("I/O failure while enumerating '{context}': {source}")]
    Io {
        /// What the source was doing (usually the source name).
        context: String,
        /// The underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// The enumeration observed a raised interrupt flag and stopped early.
    #[error("Enumeration interrupted")]
    Interrupted,

    /// A source reported a revision that belongs to a different head.
    ///
    /// This is a contract violation on the source side, not an observer
    /// misuse; observers tolerate unknown heads silently.
    #[error("Revision for head '{actual}' reported as head '{expected}'")]
    HeadMismatch {
        /// The head passed to `observe`.
        expected: Head,
        /// The head the revision actually belongs to.
        actual: Head,
    },

    /// An observer aborted the enumeration because it cannot continue.
    #[error("Observer aborted enumeration: {reason}")]
    Aborted {
        /// Human-readable description of why the observer gave up.
        reason: String,
    },
}

impl ScmError {
    /// Wraps an I/O error with the context it happened in.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns whether re-running the enumeration may succeed.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Io { source, .. } => match source.kind() {
                std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::NotFound => {
                    RetryPolicy::NonRetryable
                }
                _ => RetryPolicy::Retryable { after: None },
            },
            Self::Interrupted | Self::HeadMismatch { .. } | Self::Aborted { .. } => {
                RetryPolicy::NonRetryable
            }
        }
    }

    /// Returns `true` if this error came from a raised interrupt flag.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_io_errors_are_retryable() {
        let err = ScmError::io(
            "owner/repo",
            std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"),
        );
        assert_eq!(err.retry_policy(), RetryPolicy::Retryable { after: None });
        assert!(err.to_string().contains("owner/repo"));
    }

    #[test]
    fn interruption_is_final() {
        assert_eq!(
            ScmError::Interrupted.retry_policy(),
            RetryPolicy::NonRetryable
        );
        assert!(ScmError::Interrupted.is_interrupted());
    }
}
