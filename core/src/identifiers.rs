//! Lifecycle identifiers derived from endpoint names.
//!
//! Every endpoint `N` owns seven event types, one per [`Phase`]:
//!
//! ```text
//! getUserProfile ──► GET_USER_PROFILE_ENQUEUE
//!                    GET_USER_PROFILE_REQUEST
//!                    GET_USER_PROFILE_SUCCESS
//!                    GET_USER_PROFILE_FAILURE
//!                    GET_USER_PROFILE_MISTAKE
//!                    GET_USER_PROFILE_TIMEOUT
//!                    GET_USER_PROFILE_OFFLINE
//! ```
//!
//! # Example
//!
//! ```
//! use rascl_core::identifiers::{derive_identifiers, Phase};
//!
//! let ids = derive_identifiers("getUserProfile");
//! assert_eq!(ids.request, "GET_USER_PROFILE_REQUEST");
//! assert_eq!(ids.phase_of("GET_USER_PROFILE_OFFLINE"), Some(Phase::Offline));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of an endpoint's request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Request queued, waiting on a precondition (usually authentication)
    Enqueue,
    /// Request issued
    Request,
    /// Call resolved
    Success,
    /// Server-side fault (5xx)
    Failure,
    /// Client-side fault (4xx or unclassifiable error)
    Mistake,
    /// Call exceeded its deadline
    Timeout,
    /// No server could be reached
    Offline,
}

impl Phase {
    /// All phases in declaration order
    pub const ALL: [Self; 7] = [
        Self::Enqueue,
        Self::Request,
        Self::Success,
        Self::Failure,
        Self::Mistake,
        Self::Timeout,
        Self::Offline,
    ];

    /// Suffix appended to the normalized endpoint name
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Enqueue => "_ENQUEUE",
            Self::Request => "_REQUEST",
            Self::Success => "_SUCCESS",
            Self::Failure => "_FAILURE",
            Self::Mistake => "_MISTAKE",
            Self::Timeout => "_TIMEOUT",
            Self::Offline => "_OFFLINE",
        }
    }

    /// Lowercase tag, as stored in `lastResult`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enqueue => "enqueue",
            Self::Request => "request",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Mistake => "mistake",
            Self::Timeout => "timeout",
            Self::Offline => "offline",
        }
    }

    /// True for the four classified error phases
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(
            self,
            Self::Failure | Self::Mistake | Self::Timeout | Self::Offline
        )
    }

    /// True for phases that end a request (success or any error)
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Enqueue | Self::Request)
    }

    /// Phase named by an event type's suffix, if it has one
    #[must_use]
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|phase| event_type.ends_with(phase.suffix()))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The seven event types of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LifecycleIds {
    /// `N_ENQUEUE`
    pub enqueue: String,
    /// `N_REQUEST`
    pub request: String,
    /// `N_SUCCESS`
    pub success: String,
    /// `N_FAILURE`
    pub failure: String,
    /// `N_MISTAKE`
    pub mistake: String,
    /// `N_TIMEOUT`
    pub timeout: String,
    /// `N_OFFLINE`
    pub offline: String,
}

impl LifecycleIds {
    /// Identifier for the given phase
    #[must_use]
    pub fn get(&self, phase: Phase) -> &str {
        match phase {
            Phase::Enqueue => &self.enqueue,
            Phase::Request => &self.request,
            Phase::Success => &self.success,
            Phase::Failure => &self.failure,
            Phase::Mistake => &self.mistake,
            Phase::Timeout => &self.timeout,
            Phase::Offline => &self.offline,
        }
    }

    /// Reverse lookup: which phase does `event_type` name, if any
    #[must_use]
    pub fn phase_of(&self, event_type: &str) -> Option<Phase> {
        Phase::ALL
            .into_iter()
            .find(|phase| self.get(*phase) == event_type)
    }

    /// Iterate `(phase, identifier)` pairs in phase order
    pub fn iter(&self) -> impl Iterator<Item = (Phase, &str)> {
        Phase::ALL.into_iter().map(move |phase| (phase, self.get(phase)))
    }
}

/// Derive the lifecycle identifiers for an endpoint name.
///
/// Any string is accepted. Distinct names may normalize to the same base
/// (`get-user` and `getUser`); [`ApiMap`](crate::endpoint::ApiMap) rejects
/// such collisions at registration time.
#[must_use]
pub fn derive_identifiers(name: &str) -> LifecycleIds {
    let base = screaming_snake_case(name);
    let with = |phase: Phase| format!("{base}{}", phase.suffix());

    LifecycleIds {
        enqueue: with(Phase::Enqueue),
        request: with(Phase::Request),
        success: with(Phase::Success),
        failure: with(Phase::Failure),
        mistake: with(Phase::Mistake),
        timeout: with(Phase::Timeout),
        offline: with(Phase::Offline),
    }
}

/// Normalize `camelCase`, `PascalCase`, `kebab-case`, `snake_case` and
/// space separated names to `SCREAMING_SNAKE_CASE`.
///
/// Acronyms stay together (`fetchHTTPStatus` → `FETCH_HTTP_STATUS`), digits
/// stick to the preceding word.
#[must_use]
pub fn screaming_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        // `current` is non-empty only if chars[i - 1] was alphanumeric
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_numeric() || (prev.is_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }

        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|w| w.to_uppercase())
        .collect::<Vec<_>>()
        .join("_")
}
