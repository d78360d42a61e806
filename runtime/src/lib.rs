//! # RASCL Runtime
//!
//! Runtime for RASCL lifecycles: serializes every event through one
//! [`Store`], runs one watcher per endpoint and supervises them.
//!
//! ## Core Components
//!
//! - **Store**: owns the [`ApiState`](rascl_core::state::ApiState), applies
//!   events, routes triggers to watchers and broadcasts to observers
//! - **Workers**: call an endpoint and report exactly one terminal event
//! - **Watchers**: last-request-wins loop per endpoint
//! - **Supervisor**: restarts failed watchers with jittered backoff
//!
//! ## Example
//!
//! ```
//! use rascl_core::endpoint::ApiMap;
//! use rascl_core::identifiers::Phase;
//! use rascl_runtime::Rascl;
//! use serde_json::{json, Value};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let api = ApiMap::builder()
//!     .endpoint("getExample", |_args: Vec<Value>| async {
//!         Ok(json!(["apples", "bananas", "coconuts"]))
//!     })
//!     .build()?;
//!
//! let rascl = Rascl::builder(api).build()?;
//! let supervisor = rascl.start();
//!
//! let actions = rascl.actions("getExample").ok_or("unknown endpoint")?;
//! rascl
//!     .store()
//!     .send_and_wait_for(
//!         actions.request(vec![]),
//!         |e| actions.ids().phase_of(&e.event_type).is_some_and(Phase::is_terminal),
//!         Duration::from_secs(1),
//!     )
//!     .await?;
//!
//! let fetching = rascl.store().state(|s| s.any_fetching()).await;
//! assert!(!fetching);
//!
//! supervisor.stop().await?;
//! # Ok(())
//! # }
//! ```

/// Authentication gating for enqueue-triggered endpoints
pub mod auth;

/// Jittered exponential backoff for watcher restarts
pub mod backoff;

/// Runtime configuration
pub mod config;

/// Prometheus metrics for observability
pub mod metrics;

/// Builder tying an API map to a running system
pub mod rascl;

/// Serialized state and event routing
pub mod store;

/// Root supervisor
pub mod supervisor;

/// Per-endpoint watcher loops
pub mod watcher;

/// Request workers
pub mod worker;

/// Error types for the runtime
pub mod error {
    use rascl_core::error::ConfigError;
    use rascl_core::identifiers::Phase;
    use thiserror::Error;

    /// Errors that can occur while building or running RASCL
    #[derive(Error, Debug)]
    pub enum RuntimeError {
        /// The API map or an override is invalid
        #[error(transparent)]
        Config(#[from] ConfigError),

        /// An endpoint was given a trigger other than request or enqueue
        #[error("Endpoint '{endpoint}' cannot be triggered by {phase} events")]
        InvalidTrigger {
            /// Endpoint name
            endpoint: String,
            /// The rejected phase
            phase: Phase,
        },

        /// Store is shutting down and not accepting new events
        ///
        /// Returned when `send()` is called after shutdown completed.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for workers to complete
        ///
        /// Workers still running at that point can no longer dispatch.
        #[error("Shutdown timed out with {0} workers still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for a matching event
        ///
        /// Returned by `send_and_wait_for()`.
        #[error("Timeout waiting for event")]
        Timeout,

        /// The event broadcast closed while waiting
        #[error("Event channel closed")]
        ChannelClosed,
    }
}

pub use auth::{require_auth, AuthGatedWorker};
pub use config::RuntimeConfig;
pub use error::RuntimeError;
pub use rascl::{Rascl, RasclBuilder};
pub use store::Store;
pub use supervisor::SupervisorHandle;
pub use worker::{worker_fn, Dispatcher, RequestWorker, Worker, WorkerContext, WorkerOutcome};
