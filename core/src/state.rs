//! Per-endpoint lifecycle state and the global map of it.

use crate::error::ErrorPayload;
use crate::identifiers::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Latest lifecycle data for one endpoint.
///
/// `success`, `failure`, `mistake`, `timeout` and `offline` hold the most
/// recent terminal outcome. Error events clear the other three error
/// slots; success leaves them untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointState {
    /// Arguments of the pending enqueue, if any
    pub enqueue: Option<Vec<Value>>,
    /// Arguments of the last request
    pub request: Option<Vec<Value>>,
    /// Result of the last successful call
    pub success: Option<Value>,
    /// Last server-side fault
    pub failure: Option<ErrorPayload>,
    /// Last client-side fault
    pub mistake: Option<ErrorPayload>,
    /// Last timeout
    pub timeout: Option<ErrorPayload>,
    /// Last offline failure
    pub offline: Option<ErrorPayload>,
    /// True while an enqueue/request is outstanding
    pub is_fetching: bool,
    /// Time of the most recent event
    pub last_update: Option<DateTime<Utc>>,
    /// Phase of the most recent event
    pub last_result: Option<Phase>,
}

impl EndpointState {
    /// The initial state: every slot empty, not fetching
    #[must_use]
    pub const fn initial() -> Self {
        Self {
            enqueue: None,
            request: None,
            success: None,
            failure: None,
            mistake: None,
            timeout: None,
            offline: None,
            is_fetching: false,
            last_update: None,
            last_result: None,
        }
    }

    /// Error slot for an error phase; `None` for the other phases
    #[must_use]
    pub const fn error(&self, phase: Phase) -> Option<&ErrorPayload> {
        match phase {
            Phase::Failure => self.failure.as_ref(),
            Phase::Mistake => self.mistake.as_ref(),
            Phase::Timeout => self.timeout.as_ref(),
            Phase::Offline => self.offline.as_ref(),
            Phase::Enqueue | Phase::Request | Phase::Success => None,
        }
    }

    pub(crate) fn error_slot_mut(&mut self, phase: Phase) -> Option<&mut Option<ErrorPayload>> {
        match phase {
            Phase::Failure => Some(&mut self.failure),
            Phase::Mistake => Some(&mut self.mistake),
            Phase::Timeout => Some(&mut self.timeout),
            Phase::Offline => Some(&mut self.offline),
            Phase::Enqueue | Phase::Request | Phase::Success => None,
        }
    }
}

/// Endpoint name → [`EndpointState`].
///
/// Keys are fixed when the state is built from an
/// [`ApiMap`](crate::endpoint::ApiMap) and never change afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiState {
    endpoints: BTreeMap<String, EndpointState>,
}

impl ApiState {
    /// Initial state with one slot per name
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoints: names
                .into_iter()
                .map(|name| (name.into(), EndpointState::initial()))
                .collect(),
        }
    }

    /// State of one endpoint
    #[must_use]
    pub fn get(&self, name: impl AsRef<str>) -> Option<&EndpointState> {
        self.endpoints.get(name.as_ref())
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut EndpointState> {
        self.endpoints.get_mut(name)
    }

    /// Iterate `(name, state)` pairs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EndpointState)> {
        self.endpoints.iter().map(|(name, state)| (name.as_str(), state))
    }

    /// Registered endpoint names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    /// Number of endpoints
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// True when no endpoints are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// True if any endpoint has a request outstanding
    #[must_use]
    pub fn any_fetching(&self) -> bool {
        self.endpoints.values().any(|state| state.is_fetching)
    }
}
