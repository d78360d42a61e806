//! Root supervisor.
//!
//! Starts every [`EndpointWatcher`] as its own task. A watcher that fails
//! (returns an error or panics) is logged with its endpoint name and
//! restarted after a jittered backoff; its siblings never notice. A watcher
//! that stops normally (shutdown, closed channel) is not restarted.

use crate::backoff::RestartBackoff;
use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::metrics::SupervisorMetrics;
use crate::store::Store;
use crate::watcher::{panic_message, EndpointWatcher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{AbortHandle, JoinHandle};

/// Aborts the wrapped task when dropped
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Spawn one supervised task per watcher
#[must_use]
pub fn start(store: &Store, watchers: Vec<EndpointWatcher>, config: &RuntimeConfig) -> SupervisorHandle {
    let tasks = watchers
        .into_iter()
        .map(|watcher| {
            let name: Arc<str> = Arc::from(watcher.endpoint());
            let handle = tokio::spawn(supervise(watcher, store.clone(), config.restart_backoff.clone()));
            (name, handle)
        })
        .collect();

    tracing::info!("Supervisor started");
    SupervisorHandle {
        store: store.clone(),
        tasks,
        shutdown_timeout: config.shutdown_timeout,
    }
}

async fn supervise(watcher: EndpointWatcher, store: Store, backoff: RestartBackoff) {
    let endpoint = watcher.endpoint().to_string();
    let mut stop = store.stop_signal();
    let mut attempt: u32 = 0;

    loop {
        let started = Instant::now();
        let running = watcher.clone();
        let mut task = tokio::spawn(async move { running.run().await });
        let guard = AbortOnDrop(task.abort_handle());
        let result = (&mut task).await;
        drop(guard);

        let failure = match result {
            Ok(Ok(())) => {
                tracing::debug!(endpoint = %endpoint, "Watcher stopped");
                return;
            },
            Ok(Err(error)) => format!("{error:#}"),
            Err(error) if error.is_panic() => format!("watcher panicked: {}", panic_message(error)),
            Err(_) => return,
        };

        if *stop.borrow_and_update() {
            return;
        }
        if started.elapsed() >= backoff.reset_after() {
            attempt = 0;
        }

        let delay = backoff.delay_for_attempt(attempt);
        tracing::error!(
            endpoint = %endpoint,
            error = %failure,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Endpoint watcher failed, restarting"
        );
        SupervisorMetrics::record_restart(&endpoint);
        attempt = attempt.saturating_add(1);

        tokio::select! {
            () = tokio::time::sleep(delay) => {},
            _ = stop.changed() => return,
        }
    }
}

/// Handle to the running supervisor
#[derive(Debug)]
pub struct SupervisorHandle {
    store: Store,
    tasks: Vec<(Arc<str>, JoinHandle<()>)>,
    shutdown_timeout: Duration,
}

impl SupervisorHandle {
    /// Endpoints with a supervised watcher
    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|(name, _)| &**name)
    }

    /// True once every supervised watcher has stopped for good
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|(_, task)| task.is_finished())
    }

    /// [`shutdown`](Self::shutdown) with the configured timeout
    ///
    /// # Errors
    ///
    /// See [`shutdown`](Self::shutdown).
    pub async fn stop(self) -> Result<(), RuntimeError> {
        let timeout = self.shutdown_timeout;
        self.shutdown(timeout).await
    }

    /// Stop all watchers and wait for in-flight workers
    ///
    /// Watchers that do not exit within `timeout` are aborted together with
    /// their in-flight workers.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ShutdownTimeout`] if workers were still
    /// running when `timeout` expired.
    pub async fn shutdown(self, timeout: Duration) -> Result<(), RuntimeError> {
        let deadline = Instant::now() + timeout;
        let result = self.store.shutdown(timeout).await;

        for (name, mut task) in self.tasks {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if tokio::time::timeout(remaining, &mut task).await.is_err() {
                tracing::warn!(endpoint = %name, "Watcher did not stop in time, aborting");
                task.abort();
                let _ = task.await;
            }
        }

        tracing::info!("Supervisor stopped");
        result
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::worker::{worker_fn, RequestWorker, WorkerContext, WorkerOutcome};
    use rascl_core::endpoint::ApiMap;
    use rascl_core::environment::ApiEnvironment;
    use rascl_core::identifiers::Phase;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    fn api() -> ApiMap {
        ApiMap::builder()
            .endpoint("broken", |_args: Vec<Value>| async { Ok(Value::Null) })
            .endpoint("healthy", |_args: Vec<Value>| async { Ok(json!("fine")) })
            .build()
            .unwrap()
    }

    fn watcher(api: &ApiMap, store: &Store, name: &str, worker: Arc<dyn crate::worker::Worker>) -> EndpointWatcher {
        EndpointWatcher::new(
            api.get(name).unwrap().clone(),
            worker,
            store.clone(),
            Arc::new(Mutex::new(store.subscribe_triggers(name).unwrap())),
        )
    }

    fn fast_restarts() -> RuntimeConfig {
        RuntimeConfig::default()
            .with_restart_backoff(RestartBackoff::new().with_initial_delay(Duration::from_millis(1)))
            .with_shutdown_timeout(Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_failed_watcher_is_restarted_and_siblings_unaffected() {
        let api = api();
        let store = Store::new(&api, ApiEnvironment::production());
        let calls = Arc::new(AtomicUsize::new(0));

        let counted = Arc::clone(&calls);
        let flaky = worker_fn(move |ctx: WorkerContext| {
            let attempt = counted.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    panic!("first run fails");
                }
                let event = ctx.actions().success(json!(attempt));
                ctx.dispatcher.finish(event).await
            }
        });

        let handle = start(
            &store,
            vec![
                watcher(&api, &store, "broken", Arc::new(flaky)),
                watcher(&api, &store, "healthy", Arc::new(RequestWorker)),
            ],
            &fast_restarts(),
        );

        let broken = api.get("broken").unwrap().actions();
        let healthy = api.get("healthy").unwrap().actions();

        store.send(broken.request(vec![])).await.unwrap();
        store.send(healthy.request(vec![])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.get("broken").unwrap().last_result, Some(Phase::Mistake));
        assert_eq!(snapshot.get("healthy").unwrap().success, Some(json!("fine")));

        // Restarted watcher serves the next request
        store.send(broken.request(vec![])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let slot = store.state(|s| s.get("broken").cloned()).await.unwrap();
        assert_eq!(slot.success, Some(json!(1)));
        assert!(!handle.is_finished());

        handle.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_all_watchers() {
        let api = api();
        let store = Store::new(&api, ApiEnvironment::production());
        let handle = start(
            &store,
            vec![
                watcher(&api, &store, "broken", Arc::new(RequestWorker)),
                watcher(&api, &store, "healthy", Arc::new(RequestWorker)),
            ],
            &fast_restarts(),
        );
        assert_eq!(handle.endpoints().collect::<Vec<_>>(), vec!["broken", "healthy"]);

        handle.stop().await.unwrap();
        assert!(store.is_shut_down());
    }

    #[tokio::test]
    async fn test_shutdown_reports_stuck_worker() {
        let api = api();
        let store = Store::new(&api, ApiEnvironment::production());
        let stuck = worker_fn(|_ctx: WorkerContext| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            WorkerOutcome::Rejected
        });
        let handle = start(&store, vec![watcher(&api, &store, "broken", Arc::new(stuck))], &fast_restarts());

        store
            .send(api.get("broken").unwrap().actions().request(vec![]))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let result = handle.shutdown(Duration::from_millis(50)).await;
        assert!(matches!(result, Err(RuntimeError::ShutdownTimeout(1))));

        // The stuck worker is aborted along with its watcher
        tokio::time::timeout(Duration::from_secs(1), async {
            while store.in_flight() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("aborted worker is no longer in flight");
    }
}
