//! Request workers.
//!
//! A worker runs once per trigger event. The default [`RequestWorker`] calls
//! the endpoint, classifies a failure and dispatches exactly one terminal
//! event. Every dispatch goes through a [`Dispatcher`] bound to the
//! generation the worker was started for, so a worker that has been
//! superseded by a newer request can never change state.

use crate::error::RuntimeError;
use crate::metrics::WorkerMetrics;
use crate::store::Store;
use futures::future::BoxFuture;
use rascl_core::action::{ActionCreators, LifecycleEvent};
use rascl_core::classify::classify;
use rascl_core::endpoint::Endpoint;
use rascl_core::environment::NetworkStatus;
use rascl_core::error::ErrorPayload;
use rascl_core::identifiers::Phase;
use std::future::Future;
use std::sync::Arc;

/// How a worker run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// An event of this phase was applied
    Completed(Phase),
    /// A newer trigger arrived first; nothing was applied
    Superseded,
    /// The store refused the event (shutting down)
    Rejected,
}

/// Generation-scoped access to the store
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: Store,
    endpoint: Arc<str>,
    generation: u64,
}

impl Dispatcher {
    /// Bind a dispatcher to `endpoint` at `generation`
    #[must_use]
    pub fn new(store: Store, endpoint: impl Into<Arc<str>>, generation: u64) -> Self {
        Self {
            store,
            endpoint: endpoint.into(),
            generation,
        }
    }

    /// The underlying store
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// Generation this dispatcher was created for
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// True while no newer trigger has been applied
    pub async fn is_current(&self) -> bool {
        self.store.generation(&self.endpoint).await == Some(self.generation)
    }

    /// Apply `event` if this generation is still current
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ShutdownInProgress`] once the store has shut down.
    pub async fn dispatch(&self, event: LifecycleEvent) -> Result<bool, RuntimeError> {
        self.store
            .send_if_current(event, &self.endpoint, self.generation)
            .await
    }

    /// Dispatch a terminal event and report the outcome
    pub async fn finish(&self, event: LifecycleEvent) -> WorkerOutcome {
        let phase = Phase::from_event_type(&event.event_type);
        match self.dispatch(event).await {
            Ok(true) => {
                let phase = phase.unwrap_or(Phase::Success);
                WorkerMetrics::record_outcome(&self.endpoint, phase.as_str());
                WorkerOutcome::Completed(phase)
            },
            Ok(false) => {
                tracing::debug!(
                    endpoint = %self.endpoint,
                    generation = self.generation,
                    "Worker superseded, result dropped"
                );
                WorkerMetrics::record_superseded(&self.endpoint);
                WorkerOutcome::Superseded
            },
            Err(error) => {
                tracing::warn!(endpoint = %self.endpoint, error = %error, "Worker outcome rejected");
                WorkerOutcome::Rejected
            },
        }
    }
}

/// Everything a worker needs for one run
#[derive(Debug, Clone)]
pub struct WorkerContext {
    /// The endpoint being called
    pub endpoint: Endpoint,
    /// The trigger event
    pub event: LifecycleEvent,
    /// Generation-scoped dispatch handle
    pub dispatcher: Dispatcher,
}

impl WorkerContext {
    /// Create a context
    #[must_use]
    pub const fn new(endpoint: Endpoint, event: LifecycleEvent, dispatcher: Dispatcher) -> Self {
        Self {
            endpoint,
            event,
            dispatcher,
        }
    }

    /// Same context with a different trigger event
    #[must_use]
    pub fn with_event(self, event: LifecycleEvent) -> Self {
        Self { event, ..self }
    }

    /// Event constructors for the endpoint
    #[must_use]
    pub fn actions(&self) -> ActionCreators {
        self.endpoint.actions()
    }

    /// The store this worker reports to
    #[must_use]
    pub const fn store(&self) -> &Store {
        self.dispatcher.store()
    }

    /// Connectivity source used for classification
    #[must_use]
    pub fn network(&self) -> &dyn NetworkStatus {
        &*self.dispatcher.store().environment().network
    }
}

/// A request worker
///
/// Implementations must end every run in at most one terminal dispatch and
/// must not panic; a panic is reported as a watcher failure.
pub trait Worker: Send + Sync {
    /// Handle one trigger event
    fn run(&self, ctx: WorkerContext) -> BoxFuture<'_, WorkerOutcome>;
}

/// The default worker: call, classify, dispatch
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestWorker;

impl RequestWorker {
    /// Call the endpoint with the event's arguments and build the outcome event
    pub async fn call(ctx: &WorkerContext) -> LifecycleEvent {
        let actions = ctx.actions();
        let args = ctx.event.args();
        tracing::debug!(endpoint = ctx.endpoint.name(), args = args.len(), "Calling endpoint");

        match ctx.endpoint.call(args).await {
            Ok(result) => actions.success(result),
            Err(error) => {
                let category = classify(&error, ctx.network());
                tracing::debug!(
                    endpoint = ctx.endpoint.name(),
                    category = %category,
                    error = %error,
                    "Endpoint call failed"
                );
                actions.outcome(category, Some(ErrorPayload::from(&error)))
            },
        }
    }
}

impl Worker for RequestWorker {
    fn run(&self, ctx: WorkerContext) -> BoxFuture<'_, WorkerOutcome> {
        Box::pin(async move {
            let event = Self::call(&ctx).await;
            ctx.dispatcher.finish(event).await
        })
    }
}

/// Worker built from an async closure
pub struct FnWorker<F>(F);

/// Wrap an async closure as a [`Worker`]
///
/// ```
/// use rascl_runtime::worker::{worker_fn, RequestWorker, WorkerOutcome};
///
/// let logging = worker_fn(|ctx| async move {
///     tracing::info!(endpoint = ctx.endpoint.name(), "custom worker");
///     let event = RequestWorker::call(&ctx).await;
///     ctx.dispatcher.finish(event).await
/// });
/// # let _ = logging;
/// ```
pub fn worker_fn<F, Fut>(f: F) -> FnWorker<F>
where
    F: Fn(WorkerContext) -> Fut + Send + Sync,
    Fut: Future<Output = WorkerOutcome> + Send + 'static,
{
    FnWorker(f)
}

impl<F, Fut> Worker for FnWorker<F>
where
    F: Fn(WorkerContext) -> Fut + Send + Sync,
    Fut: Future<Output = WorkerOutcome> + Send + 'static,
{
    fn run(&self, ctx: WorkerContext) -> BoxFuture<'_, WorkerOutcome> {
        Box::pin((self.0)(ctx))
    }
}

impl<F> std::fmt::Debug for FnWorker<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnWorker")
    }
}
