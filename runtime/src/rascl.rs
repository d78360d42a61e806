//! Registration entry point.
//!
//! [`Rascl::builder`] turns an [`ApiMap`] into a running system: one store,
//! one watcher per endpoint, one supervisor over all of them.
//!
//! ```
//! use rascl_core::endpoint::ApiMap;
//! use rascl_runtime::Rascl;
//! use serde_json::{json, Value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let api = ApiMap::builder()
//!     .endpoint("getExample", |_args: Vec<Value>| async { Ok(json!(["apples"])) })
//!     .build()?;
//!
//! let rascl = Rascl::builder(api).build()?;
//! assert_eq!(rascl.types()["getExample"].request, "GET_EXAMPLE_REQUEST");
//!
//! let supervisor = rascl.start();
//! supervisor.stop().await?;
//! # Ok(())
//! # }
//! ```

use crate::auth::AuthGatedWorker;
use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::store::Store;
use crate::supervisor::{self, SupervisorHandle};
use crate::watcher::EndpointWatcher;
use crate::worker::{RequestWorker, Worker};
use rascl_core::action::ActionCreators;
use rascl_core::endpoint::ApiMap;
use rascl_core::environment::{ApiEnvironment, Clock, NetworkStatus};
use rascl_core::error::ConfigError;
use rascl_core::identifiers::{LifecycleIds, Phase};
use rascl_core::state::ApiState;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Builder for [`Rascl`]
#[must_use]
pub struct RasclBuilder {
    api: ApiMap,
    workers: HashMap<String, Arc<dyn Worker>>,
    default_worker: Arc<dyn Worker>,
    triggers: HashMap<String, Phase>,
    environment: ApiEnvironment,
    config: RuntimeConfig,
}

impl RasclBuilder {
    fn new(api: ApiMap) -> Self {
        Self {
            api,
            workers: HashMap::new(),
            default_worker: Arc::new(RequestWorker),
            triggers: HashMap::new(),
            environment: ApiEnvironment::production(),
            config: RuntimeConfig::default(),
        }
    }

    /// Use `worker` for the endpoint `name`
    pub fn worker(mut self, name: impl AsRef<str>, worker: impl Worker + 'static) -> Self {
        self.workers.insert(name.as_ref().to_string(), Arc::new(worker));
        self
    }

    /// Use `worker` for every endpoint without an override
    pub fn default_worker(mut self, worker: impl Worker + 'static) -> Self {
        self.default_worker = Arc::new(worker);
        self
    }

    /// Choose the event that starts `name`'s worker
    ///
    /// Only [`Phase::Request`] (the default) and [`Phase::Enqueue`] are
    /// valid; anything else is reported by [`build`](Self::build).
    pub fn trigger(mut self, name: impl AsRef<str>, phase: Phase) -> Self {
        self.triggers.insert(name.as_ref().to_string(), phase);
        self
    }

    /// Gate `name` behind `worker`, triggered by its enqueue event
    pub fn auth_gated(self, name: impl AsRef<str>, worker: AuthGatedWorker) -> Self {
        let name = name.as_ref();
        self.worker(name, worker).trigger(name, Phase::Enqueue)
    }

    /// Clock used to timestamp terminal events
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.environment = self.environment.with_clock(clock);
        self
    }

    /// Connectivity source used to classify failures
    pub fn network_status(mut self, network: Arc<dyn NetworkStatus>) -> Self {
        self.environment = self.environment.with_network(network);
        self
    }

    /// Runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate overrides and assemble the runtime
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::Config`] if an override names an unknown endpoint
    /// - [`RuntimeError::InvalidTrigger`] if a trigger is neither request
    ///   nor enqueue
    pub fn build(self) -> Result<Rascl, RuntimeError> {
        for name in self.workers.keys().chain(self.triggers.keys()) {
            if self.api.get(name).is_none() {
                return Err(ConfigError::UnknownEndpoint(name.clone()).into());
            }
        }
        if let Some((name, &phase)) = self
            .triggers
            .iter()
            .find(|(_, phase)| !matches!(phase, Phase::Request | Phase::Enqueue))
        {
            return Err(RuntimeError::InvalidTrigger {
                endpoint: name.clone(),
                phase,
            });
        }

        let store = Store::from_parts(&self.api, self.environment, &self.triggers, &self.config);

        // Receivers are taken now so triggers sent before start() are kept
        let mut watchers = Vec::with_capacity(self.api.len());
        for endpoint in self.api.iter() {
            let triggers = store
                .subscribe_triggers(endpoint.name())
                .ok_or_else(|| ConfigError::UnknownEndpoint(endpoint.name().to_string()))?;
            let worker = self
                .workers
                .get(endpoint.name())
                .cloned()
                .unwrap_or_else(|| Arc::clone(&self.default_worker));
            watchers.push(EndpointWatcher::new(
                endpoint.clone(),
                worker,
                store.clone(),
                Arc::new(Mutex::new(triggers)),
            ));
        }

        tracing::info!(
            endpoints = self.api.len(),
            custom_workers = self.workers.len(),
            "RASCL runtime built"
        );

        Ok(Rascl {
            api: self.api,
            store,
            watchers,
            config: self.config,
        })
    }
}

impl std::fmt::Debug for RasclBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasclBuilder")
            .field("endpoints", &self.api.len())
            .field("triggers", &self.triggers)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// An assembled RASCL runtime
#[derive(Debug)]
pub struct Rascl {
    api: ApiMap,
    store: Store,
    watchers: Vec<EndpointWatcher>,
    config: RuntimeConfig,
}

impl Rascl {
    /// Start registering an API map
    pub fn builder(api: ApiMap) -> RasclBuilder {
        RasclBuilder::new(api)
    }

    /// Endpoint name → lifecycle identifiers
    #[must_use]
    pub fn types(&self) -> BTreeMap<String, LifecycleIds> {
        self.api.types()
    }

    /// Event constructors for the endpoint `name`
    #[must_use]
    pub fn actions(&self, name: impl AsRef<str>) -> Option<ActionCreators> {
        self.api.get(name).map(rascl_core::endpoint::Endpoint::actions)
    }

    /// Fresh initial state for every endpoint
    #[must_use]
    pub fn initial_state(&self) -> ApiState {
        self.api.initial_state()
    }

    /// The store shared by all watchers
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// The registered endpoints
    #[must_use]
    pub const fn api(&self) -> &ApiMap {
        &self.api
    }

    /// Spawn the supervisor and every watcher
    ///
    /// Must be called inside a Tokio runtime. Trigger receivers are shared
    /// across calls, so a second supervisor idles until the first one stops.
    #[must_use]
    pub fn start(&self) -> SupervisorHandle {
        supervisor::start(&self.store, self.watchers.clone(), &self.config)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::worker::{worker_fn, WorkerContext};
    use serde_json::{json, Value};
    use std::time::Duration;

    fn api() -> ApiMap {
        ApiMap::builder()
            .endpoint("getExample", |_args: Vec<Value>| async { Ok(json!(["apples"])) })
            .endpoint("login", |_args: Vec<Value>| async { Ok(json!("token")) })
            .build()
            .unwrap()
    }

    #[test]
    fn test_unknown_worker_override_is_rejected() {
        let result = Rascl::builder(api()).worker("missing", RequestWorker).build();
        assert!(matches!(
            result,
            Err(RuntimeError::Config(ConfigError::UnknownEndpoint(name))) if name == "missing"
        ));
    }

    #[test]
    fn test_terminal_phase_trigger_is_rejected() {
        let result = Rascl::builder(api()).trigger("login", Phase::Success).build();
        assert!(matches!(
            result,
            Err(RuntimeError::InvalidTrigger { phase: Phase::Success, .. })
        ));
    }

    #[test]
    fn test_types_and_actions() {
        let rascl = Rascl::builder(api()).build().unwrap();
        let types = rascl.types();
        assert_eq!(types.len(), 2);
        assert_eq!(types["login"].enqueue, "LOGIN_ENQUEUE");
        assert_eq!(
            rascl.actions("getExample").unwrap().request(vec![]).event_type,
            "GET_EXAMPLE_REQUEST"
        );
        assert!(rascl.actions("nope").is_none());
        assert_eq!(rascl.initial_state().len(), 2);
    }

    #[test]
    fn test_auth_gated_sets_enqueue_trigger() {
        let rascl = Rascl::builder(api())
            .auth_gated("getExample", AuthGatedWorker::from_endpoint("login"))
            .build()
            .unwrap();
        assert_eq!(rascl.store().trigger_phase("getExample"), Some(Phase::Enqueue));
        assert_eq!(rascl.store().trigger_phase("login"), Some(Phase::Request));
    }

    #[tokio::test]
    async fn test_request_sent_before_start_is_served() {
        let rascl = Rascl::builder(api()).build().unwrap();
        let actions = rascl.actions("getExample").unwrap();
        rascl.store().send(actions.request(vec![])).await.unwrap();

        let supervisor = rascl.start();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let success = rascl
            .store()
            .state(|s| s.get("getExample").and_then(|e| e.success.clone()))
            .await;
        assert_eq!(success, Some(json!(["apples"])));
        supervisor.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_per_endpoint_worker_override() {
        let custom = worker_fn(|ctx: WorkerContext| async move {
            let event = ctx.actions().success(json!("overridden"));
            ctx.dispatcher.finish(event).await
        });
        let rascl = Rascl::builder(api()).worker("login", custom).build().unwrap();
        let supervisor = rascl.start();

        let login = rascl.actions("login").unwrap();
        let done = rascl
            .store()
            .send_and_wait_for(
                login.request(vec![]),
                |e| e.event_type == "LOGIN_SUCCESS",
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!(done.payload.to_value(), Some(json!("overridden")));
        supervisor.shutdown(Duration::from_secs(1)).await.unwrap();
    }
}
