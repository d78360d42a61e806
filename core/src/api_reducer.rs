//! The endpoint state reducer and its dispatch table.
//!
//! [`reduce_endpoint`] is the pure per-endpoint transition function.
//! [`ApiReducer`] lifts it over the whole [`ApiState`] using a table built
//! once from the [`ApiMap`]: every event type maps to the owning endpoint, the
//! phase, and the handler for that phase. Events whose type is not in the
//! table are ignored.
//!
//! | event     | slot written | also clears               | fetching |
//! |-----------|--------------|---------------------------|----------|
//! | enqueue   | `enqueue`    | `request`                 | true     |
//! | request   | `request`    | `enqueue`                 | true     |
//! | success   | `success`    | nothing                   | false    |
//! | failure.. | that slot    | the other three error slots | false  |
//!
//! Success deliberately leaves earlier error slots in place.

use crate::action::LifecycleEvent;
use crate::endpoint::ApiMap;
use crate::environment::ApiEnvironment;
use crate::error::ErrorPayload;
use crate::identifiers::Phase;
use crate::reducer::Reducer;
use crate::state::{ApiState, EndpointState};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Transition function for one phase
pub type Handler = fn(&EndpointState, &LifecycleEvent, DateTime<Utc>) -> EndpointState;

/// Dispatch table entry: which endpoint an event type belongs to and how to apply it
#[derive(Debug, Clone)]
pub struct Route {
    /// Owning endpoint
    pub endpoint: Arc<str>,
    /// Phase named by the event type
    pub phase: Phase,
    handler: Handler,
}

impl Route {
    /// Apply this route's handler
    #[must_use]
    pub fn apply(
        &self,
        state: &EndpointState,
        event: &LifecycleEvent,
        now: DateTime<Utc>,
    ) -> EndpointState {
        (self.handler)(state, event, now)
    }
}

/// Handler for a phase
#[must_use]
pub const fn handler_for(phase: Phase) -> Handler {
    match phase {
        Phase::Enqueue => on_enqueue,
        Phase::Request => on_request,
        Phase::Success => on_success,
        Phase::Failure => on_failure,
        Phase::Mistake => on_mistake,
        Phase::Timeout => on_timeout,
        Phase::Offline => on_offline,
    }
}

/// Apply one event to one endpoint's state, returning the new state.
///
/// The phase is read from the event type's suffix; an event without a known
/// suffix returns an unchanged copy.
#[must_use]
pub fn reduce_endpoint(
    state: &EndpointState,
    event: &LifecycleEvent,
    now: DateTime<Utc>,
) -> EndpointState {
    match Phase::from_event_type(&event.event_type) {
        Some(phase) => handler_for(phase)(state, event, now),
        None => state.clone(),
    }
}

fn touched(state: &EndpointState, phase: Phase, now: DateTime<Utc>) -> EndpointState {
    EndpointState {
        is_fetching: !phase.is_terminal(),
        last_update: Some(now),
        last_result: Some(phase),
        ..state.clone()
    }
}

fn on_enqueue(state: &EndpointState, event: &LifecycleEvent, now: DateTime<Utc>) -> EndpointState {
    EndpointState {
        enqueue: Some(event.args()),
        request: None,
        ..touched(state, Phase::Enqueue, now)
    }
}

fn on_request(state: &EndpointState, event: &LifecycleEvent, now: DateTime<Utc>) -> EndpointState {
    EndpointState {
        request: Some(event.args()),
        enqueue: None,
        ..touched(state, Phase::Request, now)
    }
}

fn on_success(state: &EndpointState, event: &LifecycleEvent, now: DateTime<Utc>) -> EndpointState {
    EndpointState {
        success: event.payload.to_value(),
        ..touched(state, Phase::Success, now)
    }
}

fn on_error(
    phase: Phase,
    state: &EndpointState,
    event: &LifecycleEvent,
    now: DateTime<Utc>,
) -> EndpointState {
    let mut next = EndpointState {
        failure: None,
        mistake: None,
        timeout: None,
        offline: None,
        ..touched(state, phase, now)
    };
    let error = event
        .payload
        .to_error()
        .unwrap_or_else(ErrorPayload::unknown);
    if let Some(slot) = next.error_slot_mut(phase) {
        *slot = Some(error);
    }
    next
}

fn on_failure(state: &EndpointState, event: &LifecycleEvent, now: DateTime<Utc>) -> EndpointState {
    on_error(Phase::Failure, state, event, now)
}

fn on_mistake(state: &EndpointState, event: &LifecycleEvent, now: DateTime<Utc>) -> EndpointState {
    on_error(Phase::Mistake, state, event, now)
}

fn on_timeout(state: &EndpointState, event: &LifecycleEvent, now: DateTime<Utc>) -> EndpointState {
    on_error(Phase::Timeout, state, event, now)
}

fn on_offline(state: &EndpointState, event: &LifecycleEvent, now: DateTime<Utc>) -> EndpointState {
    on_error(Phase::Offline, state, event, now)
}

/// Reducer over the global [`ApiState`]
///
/// Built once from an [`ApiMap`]; lookups are a single hash probe on the
/// event type.
#[derive(Debug, Clone)]
pub struct ApiReducer {
    routes: HashMap<String, Route>,
}

impl ApiReducer {
    /// Build the dispatch table for every endpoint in `api`
    #[must_use]
    pub fn new(api: &ApiMap) -> Self {
        let routes = api
            .iter()
            .flat_map(|endpoint| {
                let name: Arc<str> = Arc::from(endpoint.name());
                endpoint
                    .ids()
                    .iter()
                    .map(move |(phase, id)| {
                        (
                            id.to_string(),
                            Route {
                                endpoint: Arc::clone(&name),
                                phase,
                                handler: handler_for(phase),
                            },
                        )
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        Self { routes }
    }

    /// Route for an event type, if it is registered
    #[must_use]
    pub fn route(&self, event_type: &str) -> Option<&Route> {
        self.routes.get(event_type)
    }

    /// Number of registered event types (seven per endpoint)
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True when no endpoints were registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Reducer for ApiReducer {
    type State = ApiState;
    type Action = LifecycleEvent;
    type Environment = ApiEnvironment;

    fn reduce(&self, state: &mut ApiState, action: &LifecycleEvent, env: &ApiEnvironment) -> bool {
        let Some(route) = self.route(&action.event_type) else {
            return false;
        };
        let Some(slot) = state.get_mut(&route.endpoint) else {
            return false;
        };
        *slot = route.apply(slot, action, env.clock.now());
        true
    }
}
