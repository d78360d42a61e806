//! The Store - runtime coordinator for the API reducer.
//!
//! The Store owns the [`ApiState`] and is the only writer to it. Every event
//! goes through [`Store::send`]:
//!
//! 1. acquire the write lock
//! 2. apply the event through the [`ApiReducer`]
//! 3. if the event is an endpoint's trigger, bump that endpoint's generation
//!    and publish the event to the endpoint's watcher
//! 4. broadcast the event to observers
//!
//! All four steps happen under the same lock, so observers see events in
//! the order they were applied and a generation check made under the lock
//! can never race a newer trigger.

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::metrics::StoreMetrics;
use rascl_core::action::{LifecycleEvent, Payload};
use rascl_core::api_reducer::ApiReducer;
use rascl_core::endpoint::ApiMap;
use rascl_core::environment::ApiEnvironment;
use rascl_core::identifiers::Phase;
use rascl_core::reducer::Reducer;
use rascl_core::state::ApiState;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch, RwLock};

/// A trigger event handed to an endpoint watcher, tagged with the
/// generation it started
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    /// The request (or enqueue) event
    pub event: LifecycleEvent,
    /// Generation assigned when the event was applied
    pub generation: u64,
}

/// Latest-value channel feeding one endpoint's watcher
pub type TriggerReceiver = watch::Receiver<Option<Trigger>>;

struct TriggerChannel {
    phase: Phase,
    sender: watch::Sender<Option<Trigger>>,
}

struct Guarded {
    api: ApiState,
    generations: HashMap<String, u64>,
}

/// The Store - serialized state, trigger routing and event broadcast
///
/// Cheap to clone; clones share the same state.
///
/// # Example
///
/// ```
/// use rascl_core::endpoint::ApiMap;
/// use rascl_core::environment::ApiEnvironment;
/// use rascl_runtime::Store;
/// use serde_json::{json, Value};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let api = ApiMap::builder()
///     .endpoint("getExample", |_args: Vec<Value>| async { Ok(json!(1)) })
///     .build()?;
/// let store = Store::new(&api, ApiEnvironment::production());
///
/// store.send_raw("GET_EXAMPLE_REQUEST", Some(json!([])), false).await?;
/// let fetching = store.state(|s| s.get("getExample").map(|e| e.is_fetching)).await;
/// assert_eq!(fetching, Some(true));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Store {
    state: Arc<RwLock<Guarded>>,
    reducer: Arc<ApiReducer>,
    environment: ApiEnvironment,
    triggers: Arc<HashMap<String, TriggerChannel>>,
    shutdown: Arc<AtomicBool>,
    stop: Arc<watch::Sender<bool>>,
    in_flight: Arc<AtomicUsize>,
    action_broadcast: broadcast::Sender<LifecycleEvent>,
}

impl Store {
    /// Create a store where every endpoint is triggered by its request event
    #[must_use]
    pub fn new(api: &ApiMap, environment: ApiEnvironment) -> Self {
        Self::with_config(api, environment, &RuntimeConfig::default())
    }

    /// Create a store with a custom configuration
    #[must_use]
    pub fn with_config(api: &ApiMap, environment: ApiEnvironment, config: &RuntimeConfig) -> Self {
        Self::from_parts(api, environment, &HashMap::new(), config)
    }

    /// Create a store with explicit trigger phases; endpoints missing from
    /// `trigger_phases` are triggered by their request event
    pub(crate) fn from_parts(
        api: &ApiMap,
        environment: ApiEnvironment,
        trigger_phases: &HashMap<String, Phase>,
        config: &RuntimeConfig,
    ) -> Self {
        let (action_broadcast, _) = broadcast::channel(config.broadcast_capacity.max(1));
        let (stop, _) = watch::channel(false);

        let triggers = api
            .iter()
            .map(|endpoint| {
                let phase = trigger_phases
                    .get(endpoint.name())
                    .copied()
                    .unwrap_or(Phase::Request);
                let (sender, _) = watch::channel(None);
                (endpoint.name().to_string(), TriggerChannel { phase, sender })
            })
            .collect();

        let generations = api.iter().map(|e| (e.name().to_string(), 0)).collect();

        Self {
            state: Arc::new(RwLock::new(Guarded {
                api: api.initial_state(),
                generations,
            })),
            reducer: Arc::new(ApiReducer::new(api)),
            environment,
            triggers: Arc::new(triggers),
            shutdown: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(stop),
            in_flight: Arc::new(AtomicUsize::new(0)),
            action_broadcast,
        }
    }

    /// Injected dependencies
    #[must_use]
    pub const fn environment(&self) -> &ApiEnvironment {
        &self.environment
    }

    /// Send an event to the store
    ///
    /// Unregistered event types are still broadcast but leave the state
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ShutdownInProgress`] once the store has shut down.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type), name = "store_send")]
    pub async fn send(&self, event: LifecycleEvent) -> Result<(), RuntimeError> {
        self.apply(event, None).await.map(|_| ())
    }

    /// Send a host-shaped event `{ type, payload?, error? }`
    ///
    /// The payload is normalized for the phase named by `event_type`:
    /// arguments for enqueue/request, a result for success, an error
    /// payload for the four error phases.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ShutdownInProgress`] once the store has shut down.
    pub async fn send_raw(
        &self,
        event_type: impl Into<String>,
        payload: Option<Value>,
        error: bool,
    ) -> Result<(), RuntimeError> {
        let event_type = event_type.into();
        let payload = match self.reducer.route(&event_type) {
            Some(route) => Payload::for_phase(route.phase, payload),
            None => payload.map_or(Payload::Empty, Payload::Value),
        };
        self.send(LifecycleEvent::new(event_type, payload, error)).await
    }

    /// Apply `event` only if `endpoint` is still at `generation`
    ///
    /// # Returns
    ///
    /// `Ok(false)` when a newer trigger has been applied since; the event
    /// is dropped without touching state or observers.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ShutdownInProgress`] once the store has shut down.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type), name = "store_send_if_current")]
    pub async fn send_if_current(
        &self,
        event: LifecycleEvent,
        endpoint: &str,
        generation: u64,
    ) -> Result<bool, RuntimeError> {
        self.apply(event, Some((endpoint, generation))).await
    }

    async fn apply(
        &self,
        event: LifecycleEvent,
        expected: Option<(&str, u64)>,
    ) -> Result<bool, RuntimeError> {
        if self.shutdown.load(Ordering::Acquire) {
            tracing::warn!("Rejected event: store is shutting down");
            return Err(RuntimeError::ShutdownInProgress);
        }

        let route = self.reducer.route(&event.event_type);
        let mut guarded = self.state.write().await;
        let Guarded { api, generations } = &mut *guarded;

        if let Some((endpoint, generation)) = expected {
            let current = generations.get(endpoint).copied();
            if current != Some(generation) {
                tracing::debug!(
                    endpoint,
                    generation,
                    current = ?current,
                    "Dropping event from superseded generation"
                );
                return Ok(false);
            }
        }

        let start = Instant::now();
        let handled = self.reducer.reduce(api, &event, &self.environment);
        StoreMetrics::record_event(route.map_or("unrouted", |r| r.phase.as_str()), start.elapsed());

        if let Some(route) = route.filter(|_| handled) {
            if let Some(channel) = self.triggers.get(&*route.endpoint) {
                if channel.phase == route.phase {
                    let generation = generations.entry(route.endpoint.to_string()).or_insert(0);
                    *generation += 1;
                    tracing::debug!(
                        endpoint = %route.endpoint,
                        generation = *generation,
                        "Routing trigger to watcher"
                    );
                    channel.sender.send_replace(Some(Trigger {
                        event: event.clone(),
                        generation: *generation,
                    }));
                }
            }
        }

        // No receivers is fine
        let _ = self.action_broadcast.send(event);
        Ok(true)
    }

    /// Read current state via a closure
    ///
    /// ```ignore
    /// let fetching = store.state(|s| s.any_fetching()).await;
    /// ```
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&ApiState) -> T,
    {
        let guarded = self.state.read().await;
        f(&guarded.api)
    }

    /// Clone of the current state
    pub async fn snapshot(&self) -> ApiState {
        self.state(Clone::clone).await
    }

    /// Current generation of an endpoint (number of triggers applied)
    pub async fn generation(&self, endpoint: &str) -> Option<u64> {
        self.state.read().await.generations.get(endpoint).copied()
    }

    /// Phase that triggers an endpoint's watcher
    #[must_use]
    pub fn trigger_phase(&self, endpoint: &str) -> Option<Phase> {
        self.triggers.get(endpoint).map(|channel| channel.phase)
    }

    /// Subscribe to all events applied by this store
    ///
    /// Every event passed to [`send`](Self::send), including worker
    /// outcomes and unregistered types, is broadcast after it is applied.
    /// Events dropped by a generation check are not.
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.action_broadcast.subscribe()
    }

    /// Send an event and wait for a matching event
    ///
    /// Subscribes before sending, so the matching event cannot be missed.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::Timeout`]: no matching event within `timeout`
    /// - [`RuntimeError::ChannelClosed`]: the broadcast channel closed
    /// - [`RuntimeError::ShutdownInProgress`]: the store is shutting down
    ///
    /// # Example
    ///
    /// ```ignore
    /// let outcome = store
    ///     .send_and_wait_for(
    ///         actions.request(vec![]),
    ///         |e| actions.ids().phase_of(&e.event_type).is_some_and(Phase::is_terminal),
    ///         Duration::from_secs(5),
    ///     )
    ///     .await?;
    /// ```
    pub async fn send_and_wait_for<F>(
        &self,
        event: LifecycleEvent,
        predicate: F,
        timeout: Duration,
    ) -> Result<LifecycleEvent, RuntimeError>
    where
        F: Fn(&LifecycleEvent) -> bool,
    {
        // Subscribe BEFORE sending to avoid race condition
        let mut rx = self.action_broadcast.subscribe();

        self.send(event).await?;

        tokio::time::timeout(timeout, async {
            loop {
                match rx.recv().await {
                    Ok(event) if predicate(&event) => return Ok(event),
                    Ok(_) => {},
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event observer lagged, {} events skipped", skipped);
                    },
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(RuntimeError::ChannelClosed);
                    },
                }
            }
        })
        .await
        .map_err(|_| RuntimeError::Timeout)?
    }

    /// Receiver for an endpoint's trigger channel
    ///
    /// The returned receiver only sees triggers published after this call.
    #[must_use]
    pub fn subscribe_triggers(&self, endpoint: &str) -> Option<TriggerReceiver> {
        self.triggers.get(endpoint).map(|channel| channel.sender.subscribe())
    }

    /// Receiver that flips to `true` when watchers should stop
    #[must_use]
    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop.subscribe()
    }

    /// Count a worker as in flight until the guard is dropped
    #[must_use]
    pub fn track_worker(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(Arc::clone(&self.in_flight))
    }

    /// Number of workers currently running
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// True once [`shutdown`](Self::shutdown) has completed
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Stop watchers, wait for in-flight workers, then reject new events
    ///
    /// Workers that are still running when `timeout` expires can no longer
    /// dispatch their outcome.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ShutdownTimeout`] if workers were still
    /// running when the timeout expired.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), RuntimeError> {
        tracing::info!("Initiating graceful shutdown");
        self.stop.send_replace(true);

        let start = Instant::now();
        let poll_interval = Duration::from_millis(10);

        let result = loop {
            let pending = self.in_flight();
            if pending == 0 {
                tracing::info!("All workers completed, shutdown successful");
                break Ok(());
            }
            if start.elapsed() >= timeout {
                tracing::error!(pending_workers = pending, "Shutdown timeout: {} workers still running", pending);
                break Err(RuntimeError::ShutdownTimeout(pending));
            }
            tokio::time::sleep(poll_interval).await;
        };

        self.shutdown.store(true, Ordering::Release);
        result
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("endpoints", &self.triggers.len())
            .field("in_flight", &self.in_flight())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

/// Guard that decrements the in-flight worker count on drop
#[derive(Debug)]
pub struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
