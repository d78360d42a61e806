//! Restart backoff for crashed watchers.
//!
//! When a watcher fails, the supervisor waits before restarting it so a
//! watcher that fails immediately on every start does not spin. Delays grow
//! exponentially and are jittered so several endpoints failing together do
//! not restart in lockstep.
//!
//! # Example
//!
//! ```
//! use rascl_runtime::backoff::RestartBackoff;
//! use std::time::Duration;
//!
//! let backoff = RestartBackoff::new()
//!     .with_initial_delay(Duration::from_millis(50))
//!     .with_max_delay(Duration::from_secs(5));
//!
//! let delay = backoff.delay_for_attempt(3);
//! assert!(delay <= Duration::from_secs(5));
//! ```

use std::time::Duration;

/// Exponential, jittered delay between watcher restarts
///
/// # Default Values
///
/// - `initial_delay`: 100ms
/// - `max_delay`: 30 seconds
/// - `multiplier`: 2.0 (delay doubles each consecutive failure)
/// - `reset_after`: 60 seconds (a watcher that ran this long starts over at attempt 0)
#[derive(Debug, Clone)]
pub struct RestartBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    reset_after: Duration,
}

impl RestartBackoff {
    /// Create a backoff with default settings
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            reset_after: Duration::from_secs(60),
        }
    }

    /// Set the delay before the first restart
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the cap for exponential growth
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the growth factor between consecutive restarts
    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set how long a watcher must run before its failure count is reset
    #[must_use]
    pub const fn with_reset_after(mut self, duration: Duration) -> Self {
        self.reset_after = duration;
        self
    }

    /// How long a watcher must stay up to count as healthy again
    #[must_use]
    pub const fn reset_after(&self) -> Duration {
        self.reset_after
    }

    /// Delay before restart number `attempt` (0-indexed)
    ///
    /// `min(initial * multiplier^attempt, max_delay) * random(0.5..=1.0)`
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        use rand::Rng;

        // Note: attempt is capped so the exponent always fits in i32
        #[allow(clippy::cast_possible_wrap)]
        let exponent = attempt.min(64) as i32;
        let base_secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped_secs = base_secs.min(self.max_delay.as_secs_f64());

        let jitter = rand::thread_rng().gen_range(0.5..=1.0);
        Duration::from_secs_f64(capped_secs * jitter)
    }
}

impl Default for RestartBackoff {
    fn default() -> Self {
        Self::new()
    }
}
