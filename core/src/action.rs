//! Lifecycle events and their constructors.
//!
//! A [`LifecycleEvent`] is the only input the endpoint reducer accepts. Its
//! host-facing shape follows the flux-standard-action convention:
//!
//! ```text
//! { "type": "GET_EXAMPLE_SUCCESS", "payload": [...] }
//! { "type": "GET_EXAMPLE_FAILURE", "payload": { "name": ..., "message": ... }, "error": true }
//! ```
//!
//! [`ActionCreators`] builds correctly tagged events for one endpoint so
//! callers never assemble type strings by hand.

use crate::classify::OutcomeCategory;
use crate::error::ErrorPayload;
use crate::identifiers::{LifecycleIds, Phase};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Data carried by a lifecycle event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// No payload
    Empty,
    /// Positional call arguments (enqueue/request)
    Args(Vec<Value>),
    /// Call result (success)
    Value(Value),
    /// Error-like payload (failure/mistake/timeout/offline)
    Error(ErrorPayload),
}

impl Payload {
    /// True for [`Payload::Empty`]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Interpret as positional arguments.
    ///
    /// A non-array value becomes a single argument; nothing becomes no
    /// arguments.
    #[must_use]
    pub fn to_args(&self) -> Vec<Value> {
        match self {
            Self::Args(args) => args.clone(),
            Self::Value(Value::Array(items)) => items.clone(),
            Self::Value(Value::Null) | Self::Empty => Vec::new(),
            Self::Value(value) => vec![value.clone()],
            Self::Error(_) => Vec::new(),
        }
    }

    /// Interpret as a call result; `null` and nothing both read as `None`
    #[must_use]
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Self::Empty | Self::Value(Value::Null) => None,
            Self::Value(value) => Some(value.clone()),
            Self::Args(args) => Some(Value::Array(args.clone())),
            Self::Error(error) => serde_json::to_value(error).ok(),
        }
    }

    /// Interpret as an error payload, if it is one
    #[must_use]
    pub fn to_error(&self) -> Option<ErrorPayload> {
        match self {
            Self::Error(error) => Some(error.clone()),
            Self::Value(Value::String(message)) => Some(ErrorPayload::new("Error", message.clone())),
            Self::Value(Value::Object(object)) => Some(ErrorPayload::from_object(object)),
            _ => None,
        }
    }

    /// Normalize a raw host payload according to the phase it was sent with
    #[must_use]
    pub fn for_phase(phase: Phase, raw: Option<Value>) -> Self {
        let Some(raw) = raw else {
            return Self::Empty;
        };

        match phase {
            Phase::Enqueue | Phase::Request => Self::Args(Self::Value(raw).to_args()),
            Phase::Success => Self::Value(raw),
            _ => Self::Value(raw)
                .to_error()
                .map_or_else(|| Self::Error(ErrorPayload::unknown()), Self::Error),
        }
    }
}

/// A discrete state-transition trigger for one endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifecycleEvent {
    /// One of the endpoint's seven identifiers
    #[serde(rename = "type")]
    pub event_type: String,
    /// Arguments, result or error
    #[serde(skip_serializing_if = "Payload::is_empty")]
    pub payload: Payload,
    /// True exactly for the four error phases
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl LifecycleEvent {
    /// Create an event from parts
    #[must_use]
    pub fn new(event_type: impl Into<String>, payload: Payload, error: bool) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            error,
        }
    }

    /// Arguments carried by an enqueue/request event
    #[must_use]
    pub fn args(&self) -> Vec<Value> {
        self.payload.to_args()
    }
}

/// Event constructors for one endpoint
///
/// Cheap to clone; shares the endpoint name and identifiers.
///
/// # Example
///
/// ```
/// use rascl_core::action::ActionCreators;
/// use rascl_core::identifiers::derive_identifiers;
/// use serde_json::json;
///
/// let actions = ActionCreators::new("getExample", derive_identifiers("getExample"));
/// let event = actions.request(vec![json!(42)]);
/// assert_eq!(event.event_type, "GET_EXAMPLE_REQUEST");
/// assert!(!event.error);
///
/// let failed = actions.failure(None);
/// assert_eq!(failed.event_type, "GET_EXAMPLE_FAILURE");
/// assert!(failed.error);
/// ```
#[derive(Debug, Clone)]
pub struct ActionCreators {
    endpoint: Arc<str>,
    ids: Arc<LifecycleIds>,
}

impl ActionCreators {
    /// Build constructors for `endpoint` using its identifiers
    #[must_use]
    pub fn new(endpoint: impl Into<Arc<str>>, ids: impl Into<Arc<LifecycleIds>>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ids: ids.into(),
        }
    }

    /// Endpoint these constructors belong to
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The endpoint's identifiers
    #[must_use]
    pub fn ids(&self) -> &LifecycleIds {
        &self.ids
    }

    /// `N_ENQUEUE` with call arguments
    #[must_use]
    pub fn enqueue(&self, args: Vec<Value>) -> LifecycleEvent {
        LifecycleEvent::new(&self.ids.enqueue, Payload::Args(args), false)
    }

    /// `N_REQUEST` with call arguments
    #[must_use]
    pub fn request(&self, args: Vec<Value>) -> LifecycleEvent {
        LifecycleEvent::new(&self.ids.request, Payload::Args(args), false)
    }

    /// `N_SUCCESS` with the call result
    #[must_use]
    pub fn success(&self, result: Value) -> LifecycleEvent {
        LifecycleEvent::new(&self.ids.success, Payload::Value(result), false)
    }

    /// `N_FAILURE`; a synthetic error is used when `error` is `None`
    #[must_use]
    pub fn failure(&self, error: Option<ErrorPayload>) -> LifecycleEvent {
        self.error_event(Phase::Failure, error)
    }

    /// `N_MISTAKE`; a synthetic error is used when `error` is `None`
    #[must_use]
    pub fn mistake(&self, error: Option<ErrorPayload>) -> LifecycleEvent {
        self.error_event(Phase::Mistake, error)
    }

    /// `N_TIMEOUT`; a synthetic error is used when `error` is `None`
    #[must_use]
    pub fn timeout(&self, error: Option<ErrorPayload>) -> LifecycleEvent {
        self.error_event(Phase::Timeout, error)
    }

    /// `N_OFFLINE`; a synthetic error is used when `error` is `None`
    #[must_use]
    pub fn offline(&self, error: Option<ErrorPayload>) -> LifecycleEvent {
        self.error_event(Phase::Offline, error)
    }

    /// The error event matching a classified outcome
    #[must_use]
    pub fn outcome(&self, category: OutcomeCategory, error: Option<ErrorPayload>) -> LifecycleEvent {
        self.error_event(category.phase(), error)
    }

    fn error_event(&self, phase: Phase, error: Option<ErrorPayload>) -> LifecycleEvent {
        LifecycleEvent::new(
            self.ids.get(phase),
            Payload::Error(error.unwrap_or_else(ErrorPayload::unknown)),
            true,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UNKNOWN_ERROR_MESSAGE;
    use crate::identifiers::derive_identifiers;
    use serde_json::json;

    fn actions() -> ActionCreators {
        ActionCreators::new("getExample", derive_identifiers("getExample"))
    }

    #[test]
    fn test_non_error_constructors() {
        let actions = actions();

        let enqueue = actions.enqueue(vec![json!("a")]);
        assert_eq!(enqueue.event_type, "GET_EXAMPLE_ENQUEUE");
        assert_eq!(enqueue.payload, Payload::Args(vec![json!("a")]));
        assert!(!enqueue.error);

        let success = actions.success(json!(["apples", "bananas", "coconuts"]));
        assert_eq!(success.event_type, "GET_EXAMPLE_SUCCESS");
        assert!(!success.error);
    }

    #[test]
    fn test_error_constructors_substitute_unknown_error() {
        let actions = actions();
        for (event, expected) in [
            (actions.failure(None), "GET_EXAMPLE_FAILURE"),
            (actions.mistake(None), "GET_EXAMPLE_MISTAKE"),
            (actions.timeout(None), "GET_EXAMPLE_TIMEOUT"),
            (actions.offline(None), "GET_EXAMPLE_OFFLINE"),
        ] {
            assert_eq!(event.event_type, expected);
            assert!(event.error);
            match event.payload {
                Payload::Error(error) => assert_eq!(error.message, UNKNOWN_ERROR_MESSAGE),
                other => unreachable!("expected error payload, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_outcome_matches_category() {
        let event = actions().outcome(
            OutcomeCategory::Timeout,
            Some(ErrorPayload::new("TimeoutError", "too slow")),
        );
        assert_eq!(event.event_type, "GET_EXAMPLE_TIMEOUT");
        assert_eq!(event.payload.to_error().map(|e| e.message), Some("too slow".into()));
    }

    #[test]
    fn test_host_shape_serialization() {
        let request = serde_json::to_value(actions().request(vec![])).ok();
        assert_eq!(
            request,
            Some(json!({ "type": "GET_EXAMPLE_REQUEST", "payload": [] }))
        );

        let failure = serde_json::to_value(
            actions().failure(Some(ErrorPayload::new("HTTPError", "boom"))),
        )
        .ok();
        assert_eq!(
            failure,
            Some(json!({
                "type": "GET_EXAMPLE_FAILURE",
                "payload": { "name": "HTTPError", "message": "boom" },
                "error": true
            }))
        );
    }

    #[test]
    fn test_payload_for_phase_normalizes_raw_values() {
        assert_eq!(
            Payload::for_phase(Phase::Request, Some(json!(7))),
            Payload::Args(vec![json!(7)])
        );
        assert_eq!(
            Payload::for_phase(Phase::Request, Some(json!([1, 2]))),
            Payload::Args(vec![json!(1), json!(2)])
        );
        assert_eq!(Payload::for_phase(Phase::Success, None), Payload::Empty);
        assert_eq!(
            Payload::for_phase(Phase::Mistake, Some(json!("bad input"))),
            Payload::Error(ErrorPayload::new("Error", "bad input"))
        );
        assert_eq!(
            Payload::for_phase(Phase::Failure, Some(json!({"message": "disk full", "status": 507}))),
            Payload::Error(ErrorPayload {
                name: "Error".into(),
                message: "disk full".into(),
                status: Some(507),
            })
        );
        assert_eq!(
            Payload::for_phase(Phase::Offline, Some(json!(12))),
            Payload::Error(ErrorPayload::unknown())
        );
    }
}
