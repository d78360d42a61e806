//! # RASCL Testing
//!
//! Testing utilities for RASCL lifecycles.
//!
//! This crate provides:
//! - Mock implementations of environment traits ([`FixedClock`],
//!   [`ManualNetworkStatus`])
//! - Scripted endpoint calls ([`MockCall`])
//! - A Given-When-Then harness for reducers ([`ReducerTest`])
//! - A recorder for events broadcast by a store ([`EventRecorder`])
//!
//! ## Example
//!
//! ```
//! use rascl_core::endpoint::ApiMap;
//! use rascl_runtime::Rascl;
//! use rascl_testing::{test_clock, EventRecorder, MockCall};
//! use serde_json::json;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let call = MockCall::new().respond(Ok(json!(["apples"])));
//! let api = ApiMap::builder().endpoint_fn("getExample", call.call_fn()).build()?;
//! let rascl = Rascl::builder(api).clock(Arc::new(test_clock())).build()?;
//! let recorder = EventRecorder::start(rascl.store());
//! let supervisor = rascl.start();
//!
//! let actions = rascl.actions("getExample").ok_or("unknown endpoint")?;
//! rascl.store().send(actions.request(vec![])).await?;
//! recorder
//!     .wait_for(|e| e.event_type == "GET_EXAMPLE_SUCCESS", Duration::from_secs(1))
//!     .await?;
//!
//! assert_eq!(call.call_count(), 1);
//! supervisor.stop().await?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use rascl_core::environment::{Clock, NetworkStatus};

/// Scripted endpoint call functions
pub mod call_mocks;

/// Recording of broadcast events
pub mod recorder;


/// Mock implementations of environment traits
pub mod mocks {
    use super::{Clock, DateTime, NetworkStatus, Utc};
    use rascl_core::environment::ApiEnvironment;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making `last_update` reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use rascl_testing::mocks::FixedClock;
    /// use rascl_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Connectivity flag flipped by the test
    ///
    /// Starts online. Clones share the flag.
    #[derive(Debug, Clone)]
    pub struct ManualNetworkStatus {
        online: Arc<AtomicBool>,
    }

    impl ManualNetworkStatus {
        /// Create a status that reports online
        #[must_use]
        pub fn online() -> Self {
            Self {
                online: Arc::new(AtomicBool::new(true)),
            }
        }

        /// Create a status that reports offline
        #[must_use]
        pub fn offline() -> Self {
            let status = Self::online();
            status.set_online(false);
            status
        }

        /// Change the reported connectivity
        pub fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }
    }

    impl Default for ManualNetworkStatus {
        fn default() -> Self {
            Self::online()
        }
    }

    impl NetworkStatus for ManualNetworkStatus {
        fn is_online(&self) -> bool {
            self.online.load(Ordering::SeqCst)
        }
    }

    /// Environment with [`test_clock`] and an online network
    #[must_use]
    pub fn test_environment() -> ApiEnvironment {
        ApiEnvironment::new(Arc::new(test_clock()), Arc::new(ManualNetworkStatus::online()))
    }
}

// Re-export commonly used items
pub use call_mocks::{MockCall, MockResponse};
pub use mocks::{test_clock, test_environment, FixedClock, ManualNetworkStatus};
pub use recorder::EventRecorder;
pub use reducer_test::ReducerTest;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
        assert_eq!(time1.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_manual_network_status_is_shared() {
        let status = ManualNetworkStatus::online();
        let handle = status.clone();
        assert!(status.is_online());

        handle.set_online(false);
        assert!(!status.is_online());
        assert!(!ManualNetworkStatus::offline().is_online());
    }
}
