//! Runtime configuration.

use crate::backoff::RestartBackoff;
use std::time::Duration;

/// Configuration for a [`Rascl`](crate::Rascl) runtime
///
/// # Example
///
/// ```
/// use rascl_runtime::backoff::RestartBackoff;
/// use rascl_runtime::RuntimeConfig;
/// use std::time::Duration;
///
/// let config = RuntimeConfig::default()
///     .with_broadcast_capacity(256)
///     .with_restart_backoff(RestartBackoff::new().with_max_delay(Duration::from_secs(5)))
///     .with_shutdown_timeout(Duration::from_secs(10));
///
/// assert_eq!(config.broadcast_capacity, 256);
/// ```
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Events buffered per observer before it starts lagging
    pub broadcast_capacity: usize,
    /// Delay policy for restarting failed watchers
    pub restart_backoff: RestartBackoff,
    /// Default time to wait for in-flight workers on shutdown
    pub shutdown_timeout: Duration,
}

impl RuntimeConfig {
    /// Create a configuration with explicit values
    #[must_use]
    pub const fn new(
        broadcast_capacity: usize,
        restart_backoff: RestartBackoff,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            broadcast_capacity,
            restart_backoff,
            shutdown_timeout,
        }
    }

    /// Set the event broadcast capacity
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// Set the watcher restart backoff
    #[must_use]
    pub const fn with_restart_backoff(mut self, backoff: RestartBackoff) -> Self {
        self.restart_backoff = backoff;
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 64,
            restart_backoff: RestartBackoff::default(),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}
