//! Endpoint watchers.
//!
//! One watcher per endpoint waits for trigger events and runs a worker for
//! each. States:
//!
//! ```text
//!            trigger                      worker done
//!   Idle ──────────────▶ Fetching ──────────────────▶ Idle
//!                          │  ▲
//!                          └──┘ trigger: abort current worker, start new one
//! ```
//!
//! Triggers arrive on a latest-value channel, so several requests arriving
//! while the watcher is busy collapse into the newest one.

use crate::metrics::WorkerMetrics;
use crate::store::{Store, Trigger, TriggerReceiver};
use crate::worker::{Dispatcher, Worker, WorkerContext, WorkerOutcome};
use anyhow::anyhow;
use rascl_core::endpoint::Endpoint;
use rascl_core::error::ErrorPayload;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};
use tracing::Instrument;

/// In-flight worker; aborted when dropped so it never outlives its watcher
struct Running {
    handle: JoinHandle<WorkerOutcome>,
    generation: u64,
}

impl Drop for Running {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Restartable loop feeding one endpoint's triggers to its worker
#[derive(Clone)]
pub struct EndpointWatcher {
    endpoint: Endpoint,
    worker: Arc<dyn Worker>,
    store: Store,
    triggers: Arc<Mutex<TriggerReceiver>>,
}

impl EndpointWatcher {
    /// Create a watcher
    ///
    /// The trigger receiver is shared between restarts of this watcher so
    /// a trigger published while it was down is still delivered.
    #[must_use]
    pub fn new(
        endpoint: Endpoint,
        worker: Arc<dyn Worker>,
        store: Store,
        triggers: Arc<Mutex<TriggerReceiver>>,
    ) -> Self {
        Self {
            endpoint,
            worker,
            store,
            triggers,
        }
    }

    /// Endpoint this watcher serves
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.endpoint.name()
    }

    /// Run until the store signals stop or the trigger channel closes
    ///
    /// # Errors
    ///
    /// Fails when a worker panics. The panicking worker's generation is
    /// closed with a `mistake` so the endpoint does not stay fetching.
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut triggers = self.triggers.lock().await;
        let mut stop = self.store.stop_signal();
        let mut current: Option<Running> = None;

        if *stop.borrow_and_update() {
            return Ok(());
        }
        tracing::debug!(endpoint = self.endpoint(), "Watcher started");

        loop {
            tokio::select! {
                changed = triggers.changed() => {
                    if changed.is_err() {
                        tracing::debug!(endpoint = self.endpoint(), "Trigger channel closed");
                        return Ok(());
                    }
                    let Some(trigger) = triggers.borrow_and_update().clone() else {
                        continue;
                    };
                    if let Some(previous) = current.take().filter(|r| !r.handle.is_finished()) {
                        tracing::debug!(
                            endpoint = self.endpoint(),
                            generation = previous.generation,
                            "Aborting superseded worker"
                        );
                        previous.handle.abort();
                        WorkerMetrics::record_superseded(self.endpoint());
                    }
                    current = Some(self.spawn_worker(trigger));
                },
                joined = join(&mut current), if current.is_some() => {
                    let generation = current.take().map_or(0, |running| running.generation);
                    match joined {
                        Ok(outcome) => {
                            tracing::debug!(endpoint = self.endpoint(), generation, ?outcome, "Worker finished");
                        },
                        Err(error) if error.is_panic() => {
                            let message = panic_message(error);
                            self.close_generation(generation, &message).await;
                            return Err(anyhow!("worker for '{}' panicked: {message}", self.endpoint()));
                        },
                        Err(_) => {},
                    }
                },
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        tracing::debug!(endpoint = self.endpoint(), "Watcher stopping");
                        // Drain the in-flight worker; it is aborted if this task is aborted first
                        if let Some(mut running) = current.take() {
                            let _ = (&mut running.handle).await;
                        }
                        return Ok(());
                    }
                },
            }
        }
    }

    fn spawn_worker(&self, trigger: Trigger) -> Running {
        let Trigger { event, generation } = trigger;
        let span = tracing::info_span!("worker", endpoint = self.endpoint(), generation);
        let ctx = WorkerContext::new(
            self.endpoint.clone(),
            event,
            Dispatcher::new(self.store.clone(), self.endpoint(), generation),
        );
        let worker = Arc::clone(&self.worker);
        let in_flight = self.store.track_worker();

        WorkerMetrics::record_start(self.endpoint());
        let handle = tokio::spawn(
            async move {
                let _in_flight = in_flight;
                worker.run(ctx).await
            }
            .instrument(span),
        );

        Running { handle, generation }
    }

    async fn close_generation(&self, generation: u64, message: &str) {
        let event = self
            .endpoint
            .actions()
            .mistake(Some(ErrorPayload::new("WorkerPanic", message)));
        let dispatcher = Dispatcher::new(self.store.clone(), self.endpoint(), generation);
        dispatcher.finish(event).await;
    }
}

impl std::fmt::Debug for EndpointWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointWatcher")
            .field("endpoint", &self.endpoint())
            .finish_non_exhaustive()
    }
}

async fn join(running: &mut Option<Running>) -> Result<WorkerOutcome, JoinError> {
    match running {
        Some(running) => (&mut running.handle).await,
        None => std::future::pending().await,
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(error: JoinError) -> String {
    match error.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string()),
        Err(error) => error.to_string(),
    }
}
