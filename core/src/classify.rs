//! Outcome classification for failed calls.
//!
//! Decision order (first match wins):
//!
//! ```text
//! Timeout                          → timeout
//! status >= 500                    → failure
//! 400 <= status < 500              → mistake
//! no response / status 0 / offline → offline
//! anything else                    → mistake
//! ```
//!
//! Timeouts are checked first because a timed-out call never has a
//! response; checking response absence first would report it as offline.

use crate::environment::NetworkStatus;
use crate::error::CallError;
use crate::identifiers::Phase;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four error outcomes a call can end in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeCategory {
    /// Server-side fault
    Failure,
    /// Client-side or unclassifiable fault
    Mistake,
    /// Deadline exceeded
    Timeout,
    /// Server unreachable
    Offline,
}

impl OutcomeCategory {
    /// Lifecycle phase that reports this outcome
    #[must_use]
    pub const fn phase(self) -> Phase {
        match self {
            Self::Failure => Phase::Failure,
            Self::Mistake => Phase::Mistake,
            Self::Timeout => Phase::Timeout,
            Self::Offline => Phase::Offline,
        }
    }

    /// Lowercase label, used as a metrics/log field
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.phase().as_str()
    }
}

impl fmt::Display for OutcomeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<OutcomeCategory> for Phase {
    fn from(category: OutcomeCategory) -> Self {
        category.phase()
    }
}

/// Classify a failed call.
///
/// `network` is consulted only after timeouts and 4xx/5xx responses have
/// been ruled out, so a definite server answer always wins over an offline
/// flag.
pub fn classify<N>(error: &CallError, network: &N) -> OutcomeCategory
where
    N: NetworkStatus + ?Sized,
{
    match error {
        CallError::Timeout { .. } => OutcomeCategory::Timeout,
        CallError::Unknown => OutcomeCategory::Mistake,
        _ => match error.status() {
            Some(status) if status >= 500 => OutcomeCategory::Failure,
            Some(status) if status >= 400 => OutcomeCategory::Mistake,
            _ if !network.is_online() => OutcomeCategory::Offline,
            None if matches!(error, CallError::Http { .. } | CallError::Network { .. }) => {
                OutcomeCategory::Offline
            },
            _ => OutcomeCategory::Mistake,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::AlwaysOnline;

    struct Offline;

    impl NetworkStatus for Offline {
        fn is_online(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_server_errors_are_failures() {
        assert_eq!(
            classify(&CallError::http(500, "Internal Server Error"), &AlwaysOnline),
            OutcomeCategory::Failure
        );
        assert_eq!(
            classify(&CallError::http(503, "Service Unavailable"), &AlwaysOnline),
            OutcomeCategory::Failure
        );
    }

    #[test]
    fn test_client_errors_are_mistakes() {
        assert_eq!(
            classify(&CallError::http(404, "Not Found"), &AlwaysOnline),
            OutcomeCategory::Mistake
        );
        assert_eq!(
            classify(&CallError::http(400, "Bad Request"), &AlwaysOnline),
            OutcomeCategory::Mistake
        );
        assert_eq!(
            classify(&CallError::http(499, "Client Closed"), &AlwaysOnline),
            OutcomeCategory::Mistake
        );
    }

    #[test]
    fn test_timeout_wins_over_missing_response_and_offline() {
        let error = CallError::timeout("Request timed out");
        assert_eq!(classify(&error, &AlwaysOnline), OutcomeCategory::Timeout);
        assert_eq!(classify(&error, &Offline), OutcomeCategory::Timeout);
    }

    #[test]
    fn test_missing_response_is_offline() {
        let zero = CallError::Http {
            status: Some(0),
            message: "opaque response".into(),
            body: None,
        };
        let absent = CallError::Http {
            status: None,
            message: "no status".into(),
            body: None,
        };
        assert_eq!(classify(&zero, &AlwaysOnline), OutcomeCategory::Offline);
        assert_eq!(classify(&absent, &AlwaysOnline), OutcomeCategory::Offline);
        assert_eq!(
            classify(&CallError::network("connection refused"), &AlwaysOnline),
            OutcomeCategory::Offline
        );
    }

    #[test]
    fn test_offline_flag_does_not_override_http_status() {
        assert_eq!(
            classify(&CallError::http(502, "Bad Gateway"), &Offline),
            OutcomeCategory::Failure
        );
        assert_eq!(
            classify(&CallError::http(304, "Not Modified"), &Offline),
            OutcomeCategory::Offline
        );
    }

    #[test]
    fn test_unexpected_status_while_online_is_mistake() {
        assert_eq!(
            classify(&CallError::http(302, "Found"), &AlwaysOnline),
            OutcomeCategory::Mistake
        );
    }

    #[test]
    fn test_generic_and_unknown_errors_are_mistakes() {
        assert_eq!(
            classify(&CallError::other("could not parse body"), &AlwaysOnline),
            OutcomeCategory::Mistake
        );
        assert_eq!(classify(&CallError::Unknown, &AlwaysOnline), OutcomeCategory::Mistake);
        assert_eq!(classify(&CallError::Unknown, &Offline), OutcomeCategory::Mistake);
    }

    #[test]
    fn test_category_maps_to_error_phase() {
        for category in [
            OutcomeCategory::Failure,
            OutcomeCategory::Mistake,
            OutcomeCategory::Timeout,
            OutcomeCategory::Offline,
        ] {
            assert!(category.phase().is_error());
            assert_eq!(category.as_str(), Phase::from(category).as_str());
        }
    }
}
