//! Authentication gating.
//!
//! Some endpoints need credentials that only become available after another
//! call (a login, a token refresh) has succeeded. Such endpoints are
//! triggered by their `*_ENQUEUE` event instead of `*_REQUEST`:
//!
//! ```text
//! N_ENQUEUE ─▶ wait until selector(state) is Some(auth)
//!           ─▶ N_REQUEST [auth, ...args]
//!           ─▶ call ─▶ N_SUCCESS / N_FAILURE / ...
//! ```
//!
//! The wait never calls the remote function. It is cancelled like any other
//! worker when a newer enqueue arrives, and gives up when the store stops.

use crate::error::RuntimeError;
use crate::store::Store;
use crate::worker::{RequestWorker, Worker, WorkerContext, WorkerOutcome};
use futures::future::BoxFuture;
use rascl_core::action::LifecycleEvent;
use rascl_core::identifiers::{derive_identifiers, Phase};
use rascl_core::state::ApiState;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Wait until `selector` yields a value
///
/// Reads `selector(&state)`; while it returns `None`, waits for the next
/// applied event matching `pattern` and reads again. Subscribes before the
/// first read, so an event applied in between is not missed.
///
/// # Errors
///
/// - [`RuntimeError::ChannelClosed`]: the store's broadcast closed while waiting
/// - [`RuntimeError::ShutdownInProgress`]: the store was told to stop
pub async fn require_auth<T, P, S>(store: &Store, pattern: P, selector: S) -> Result<T, RuntimeError>
where
    P: Fn(&LifecycleEvent) -> bool,
    S: Fn(&ApiState) -> Option<T>,
{
    let mut rx = store.subscribe_actions();
    let mut stop = store.stop_signal();

    loop {
        if let Some(auth) = store.state(&selector).await {
            return Ok(auth);
        }
        if *stop.borrow_and_update() {
            return Err(RuntimeError::ShutdownInProgress);
        }

        tracing::debug!("Waiting for authentication");
        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(event) if pattern(&event) => break,
                    Ok(_) => {},
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Auth observer lagged, re-reading state");
                        break;
                    },
                    Err(RecvError::Closed) => return Err(RuntimeError::ChannelClosed),
                },
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        return Err(RuntimeError::ShutdownInProgress);
                    }
                },
            }
        }
    }
}

type Pattern = Arc<dyn Fn(&LifecycleEvent) -> bool + Send + Sync>;
type Selector = Arc<dyn Fn(&ApiState) -> Option<Value> + Send + Sync>;

/// Worker that waits for credentials before calling through
///
/// Handles the endpoint's enqueue event: blocks in [`require_auth`], then
/// dispatches the request event with the credentials prepended to the
/// arguments and runs the [`RequestWorker`] on it. A request event reaching
/// this worker directly is called as-is.
#[derive(Clone)]
pub struct AuthGatedWorker {
    pattern: Pattern,
    selector: Selector,
}

impl AuthGatedWorker {
    /// Gate on an arbitrary pattern and selector
    pub fn new<P, S>(pattern: P, selector: S) -> Self
    where
        P: Fn(&LifecycleEvent) -> bool + Send + Sync + 'static,
        S: Fn(&ApiState) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            pattern: Arc::new(pattern),
            selector: Arc::new(selector),
        }
    }

    /// Gate on another endpoint's last success
    ///
    /// Credentials are the `success` slot of `login_endpoint`; the gate is
    /// re-checked on each of its success events.
    #[must_use]
    pub fn from_endpoint(login_endpoint: &str) -> Self {
        let name = login_endpoint.to_string();
        let success = derive_identifiers(login_endpoint).success;
        Self::new(
            move |event: &LifecycleEvent| event.event_type == success,
            move |state: &ApiState| state.get(&name).and_then(|slot| slot.success.clone()),
        )
    }

    async fn gate(&self, ctx: WorkerContext) -> WorkerOutcome {
        let auth = match require_auth(ctx.store(), |e| (self.pattern)(e), |s| (self.selector)(s)).await {
            Ok(auth) => auth,
            Err(RuntimeError::ShutdownInProgress) => {
                tracing::debug!(endpoint = ctx.endpoint.name(), "Auth wait ended by shutdown");
                return WorkerOutcome::Rejected;
            },
            Err(error) => {
                tracing::warn!(endpoint = ctx.endpoint.name(), error = %error, "Auth wait aborted");
                return WorkerOutcome::Rejected;
            },
        };

        let mut args = Vec::with_capacity(ctx.event.args().len() + 1);
        args.push(auth);
        args.extend(ctx.event.args());
        let request = ctx.actions().request(args);

        tracing::debug!(endpoint = ctx.endpoint.name(), "Authenticated, issuing request");
        match ctx.dispatcher.dispatch(request.clone()).await {
            Ok(true) => RequestWorker.run(ctx.with_event(request)).await,
            Ok(false) => WorkerOutcome::Superseded,
            Err(_) => WorkerOutcome::Rejected,
        }
    }
}

impl Worker for AuthGatedWorker {
    fn run(&self, ctx: WorkerContext) -> BoxFuture<'_, WorkerOutcome> {
        Box::pin(async move {
            if ctx.endpoint.ids().phase_of(&ctx.event.event_type) == Some(Phase::Enqueue) {
                self.gate(ctx).await
            } else {
                RequestWorker.run(ctx).await
            }
        })
    }
}

impl std::fmt::Debug for AuthGatedWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGatedWorker").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::worker::Dispatcher;
    use rascl_core::endpoint::ApiMap;
    use rascl_core::environment::ApiEnvironment;
    use serde_json::json;
    use std::time::Duration;

    fn api() -> ApiMap {
        ApiMap::builder()
            .endpoint("login", |_args: Vec<Value>| async { Ok(json!("token-1")) })
            .endpoint("getAccount", |args: Vec<Value>| async move { Ok(Value::Array(args)) })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_require_auth_returns_immediately_when_available() {
        let api = api();
        let store = Store::new(&api, ApiEnvironment::production());
        let login = api.get("login").unwrap().actions();
        store.send(login.success(json!("token"))).await.unwrap();

        let auth = require_auth(
            &store,
            |_| false,
            |s| s.get("login").and_then(|e| e.success.clone()),
        )
        .await
        .unwrap();
        assert_eq!(auth, json!("token"));
    }

    #[tokio::test]
    async fn test_require_auth_waits_for_matching_event() {
        let api = api();
        let store = Store::new(&api, ApiEnvironment::production());
        let login = api.get("login").unwrap().actions();

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move {
                require_auth(
                    &store,
                    |e| e.event_type == "LOGIN_SUCCESS",
                    |s| s.get("login").and_then(|e| e.success.clone()),
                )
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        store.send(login.success(json!("token"))).await.unwrap();
        let auth = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(auth, json!("token"));
    }

    #[tokio::test]
    async fn test_require_auth_gives_up_on_shutdown() {
        let api = api();
        let store = Store::new(&api, ApiEnvironment::production());

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move {
                require_auth(
                    &store,
                    |e| e.event_type == "LOGIN_SUCCESS",
                    |s| s.get("login").and_then(|e| e.success.clone()),
                )
                .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        store.shutdown(Duration::from_millis(100)).await.unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert!(matches!(result, Err(RuntimeError::ShutdownInProgress)));
    }

    #[tokio::test]
    async fn test_gated_worker_prepends_auth() {
        let api = api();
        let phases = std::collections::HashMap::from([("getAccount".to_string(), Phase::Enqueue)]);
        let store = Store::from_parts(
            &api,
            ApiEnvironment::production(),
            &phases,
            &crate::RuntimeConfig::default(),
        );
        let account = api.get("getAccount").unwrap().clone();
        let enqueue = account.actions().enqueue(vec![json!(7)]);
        store.send(enqueue.clone()).await.unwrap();
        let generation = store.generation("getAccount").await.unwrap();

        let ctx = WorkerContext::new(account, enqueue, Dispatcher::new(store.clone(), "getAccount", generation));
        let worker = AuthGatedWorker::from_endpoint("login");
        let run = tokio::spawn(async move { worker.run(ctx).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!run.is_finished());
        let slot = store.state(|s| s.get("getAccount").cloned()).await.unwrap();
        assert_eq!(slot.last_result, Some(Phase::Enqueue));

        store
            .send(api.get("login").unwrap().actions().success(json!("token-1")))
            .await
            .unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(1), run).await.unwrap().unwrap();

        assert_eq!(outcome, WorkerOutcome::Completed(Phase::Success));
        let slot = store.state(|s| s.get("getAccount").cloned()).await.unwrap();
        assert_eq!(slot.request, Some(vec![json!("token-1"), json!(7)]));
        assert_eq!(slot.success, Some(json!(["token-1", 7])));
    }
}
