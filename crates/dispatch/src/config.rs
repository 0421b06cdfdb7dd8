//! Dispatcher configuration.

use serde::{Deserialize, Serialize};

use crate::DispatchError;

/// Default base label for delivering workers.
pub const DEFAULT_WORKER_NAME: &str = "scm-event-dispatch";

/// Where delivery tasks run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PoolConfig {
    /// On the runtime the dispatcher is created in.
    #[default]
    Shared,
    /// On a runtime owned by the dispatcher, so event volume cannot starve
    /// other timer-driven work.
    Dedicated {
        /// Number of async worker threads (timers for delayed delivery).
        worker_threads: usize,
    },
}

/// Settings for a [`crate::Dispatcher`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Base label for the diagnostic name of a delivering worker.
    pub worker_name: String,
    /// Pool selection.
    pub pool: PoolConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_name: DEFAULT_WORKER_NAME.to_string(),
            pool: PoolConfig::Shared,
        }
    }
}

impl DispatcherConfig {
    /// Checks the settings; a dispatcher never starts with an invalid config.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.worker_name.trim().is_empty() {
            return Err(DispatchError::ConfigurationError {
                message: "worker_name must not be empty".to_string(),
            });
        }
        if let PoolConfig::Dedicated { worker_threads: 0 } = self.pool {
            return Err(DispatchError::ConfigurationError {
                message: "dedicated pool needs at least one worker thread".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DispatcherConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pool, PoolConfig::Shared);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: DispatcherConfig =
            serde_json::from_str(r#"{"pool": {"mode": "dedicated", "worker_threads": 2}}"#)
                .unwrap();
        assert_eq!(config.worker_name, DEFAULT_WORKER_NAME);
        assert_eq!(config.pool, PoolConfig::Dedicated { worker_threads: 2 });
    }

    #[test]
    fn rejects_empty_pool_and_blank_name() {
        let config = DispatcherConfig {
            pool: PoolConfig::Dedicated { worker_threads: 0 },
            ..DispatcherConfig::default()
        };
        assert!(config.validate().is_err());

        let config = DispatcherConfig {
            worker_name: "  ".to_string(),
            ..DispatcherConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DispatchError::ConfigurationError { .. })
        ));
    }
}
