//! # RASCL Core
//!
//! Pure building blocks for generating API call lifecycles.
//!
//! Given a map of named asynchronous calls, this crate derives everything a
//! host application needs to track each call through its lifecycle:
//!
//! - **Identifiers**: seven stable event type strings per endpoint
//! - **Action creators**: constructors for correctly tagged lifecycle events
//! - **Classifier**: maps a failed call onto failure/mistake/timeout/offline
//! - **Reducer**: folds lifecycle events into per-endpoint state
//!
//! Nothing here performs I/O or spawns tasks; the `rascl-runtime` crate
//! drives calls and feeds their outcomes back through the reducer.
//!
//! ## Lifecycle
//!
//! ```text
//! ENQUEUE ─▶ REQUEST ─┬─▶ SUCCESS
//!                     ├─▶ FAILURE   (5xx)
//!                     ├─▶ MISTAKE   (4xx, bad input)
//!                     ├─▶ TIMEOUT
//!                     └─▶ OFFLINE   (no response)
//! ```
//!
//! ## Example
//!
//! ```
//! use rascl_core::api_reducer::ApiReducer;
//! use rascl_core::endpoint::ApiMap;
//! use rascl_core::environment::ApiEnvironment;
//! use rascl_core::reducer::Reducer;
//! use serde_json::{json, Value};
//!
//! # fn main() -> Result<(), rascl_core::error::ConfigError> {
//! let api = ApiMap::builder()
//!     .endpoint("getExample", |_args: Vec<Value>| async { Ok(json!([1, 2, 3])) })
//!     .build()?;
//!
//! let reducer = ApiReducer::new(&api);
//! let env = ApiEnvironment::production();
//! let mut state = api.initial_state();
//! let actions = api.types();
//!
//! let creators = api.get("getExample").map(|e| e.actions());
//! if let Some(creators) = creators {
//!     reducer.reduce(&mut state, &creators.request(vec![]), &env);
//!     reducer.reduce(&mut state, &creators.success(json!([1, 2, 3])), &env);
//! }
//!
//! let slot = state.get("getExample");
//! assert_eq!(slot.and_then(|s| s.success.clone()), Some(json!([1, 2, 3])));
//! assert_eq!(actions["getExample"].request, "GET_EXAMPLE_REQUEST");
//! # Ok(())
//! # }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde_json::Value;

pub mod action;
pub mod api_reducer;
pub mod classify;
pub mod endpoint;
pub mod error;
#[cfg(feature = "reqwest")]
pub mod http;
pub mod identifiers;
pub mod state;

/// Reducer module - The core trait for state transitions
///
/// Reducers are pure functions: `(State, Action, Environment) → State'`.
/// They never perform I/O; anything time-dependent reads the clock from the
/// environment so tests stay deterministic.
pub mod reducer {
    pub use crate::api_reducer::{reduce_endpoint, ApiReducer};

    /// The Reducer trait - core abstraction for state transitions
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```
    /// use rascl_core::reducer::Reducer;
    ///
    /// struct CounterReducer;
    ///
    /// impl Reducer for CounterReducer {
    ///     type State = i64;
    ///     type Action = i64;
    ///     type Environment = ();
    ///
    ///     fn reduce(&self, state: &mut i64, action: &i64, _env: &()) -> bool {
    ///         *state += action;
    ///         true
    ///     }
    /// }
    ///
    /// let mut total = 0;
    /// assert!(CounterReducer.reduce(&mut total, &5, &()));
    /// assert_eq!(total, 5);
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Apply an action to the state in place
        ///
        /// # Returns
        ///
        /// `true` if the action was recognized. Unrecognized actions must
        /// leave the state untouched.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: &Self::Action,
            env: &Self::Environment,
        ) -> bool;
    }
}

/// Environment module - Dependency injection traits
///
/// All ambient inputs (current time, connectivity) are abstracted behind
/// traits and injected via [`ApiEnvironment`](environment::ApiEnvironment).
pub mod environment {
    use chrono::{DateTime, Utc};
    use std::fmt;
    use std::sync::Arc;

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{DateTime, Utc};
    /// use rascl_core::environment::Clock;
    ///
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Whether the host currently believes it has connectivity
    pub trait NetworkStatus: Send + Sync {
        /// `false` when the host knows it is offline
        fn is_online(&self) -> bool;
    }

    /// Connectivity source that never reports offline
    #[derive(Debug, Clone, Copy, Default)]
    pub struct AlwaysOnline;

    impl NetworkStatus for AlwaysOnline {
        fn is_online(&self) -> bool {
            true
        }
    }

    /// Dependencies shared by the reducer and the workers
    #[derive(Clone)]
    pub struct ApiEnvironment {
        /// Time source for `last_update`
        pub clock: Arc<dyn Clock>,
        /// Connectivity source for the classifier
        pub network: Arc<dyn NetworkStatus>,
    }

    impl ApiEnvironment {
        /// Create an environment from explicit dependencies
        #[must_use]
        pub fn new(clock: Arc<dyn Clock>, network: Arc<dyn NetworkStatus>) -> Self {
            Self { clock, network }
        }

        /// System clock, always online
        #[must_use]
        pub fn production() -> Self {
            Self::new(Arc::new(SystemClock), Arc::new(AlwaysOnline))
        }

        /// Replace the clock
        #[must_use]
        pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
            self.clock = clock;
            self
        }

        /// Replace the connectivity source
        #[must_use]
        pub fn with_network(mut self, network: Arc<dyn NetworkStatus>) -> Self {
            self.network = network;
            self
        }
    }

    impl Default for ApiEnvironment {
        fn default() -> Self {
            Self::production()
        }
    }

    impl fmt::Debug for ApiEnvironment {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("ApiEnvironment")
                .field("now", &self.clock.now())
                .field("online", &self.network.is_online())
                .finish()
        }
    }
}
