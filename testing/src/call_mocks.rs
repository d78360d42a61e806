//! Scripted endpoint calls
//!
//! [`MockCall`] stands in for a remote function: it hands out scripted
//! responses in order, optionally after a delay, and records the arguments
//! of every call.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Only panics on a poisoned lock

use rascl_core::endpoint::{call_fn, CallFn};
use rascl_core::error::CallError;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted response
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// Value or error the call resolves with
    pub result: Result<Value, CallError>,
    /// Time to wait before resolving
    pub delay: Duration,
}

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<MockResponse>,
    fallback: Option<MockResponse>,
    calls: Vec<Vec<Value>>,
}

/// Call function with scripted responses
///
/// Responses are consumed in order. Once the script is exhausted the
/// fallback (see [`otherwise`](Self::otherwise)) is used, or the call
/// resolves with `null`.
///
/// # Example
///
/// ```
/// use rascl_core::error::CallError;
/// use rascl_testing::MockCall;
/// use serde_json::json;
/// use std::time::Duration;
///
/// let call = MockCall::new()
///     .respond_after(Duration::from_millis(50), Ok(json!("slow")))
///     .respond(Err(CallError::http(500, "Internal Server Error")));
/// assert_eq!(call.remaining(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct MockCall {
    script: Arc<Mutex<Script>>,
}

impl MockCall {
    /// Create an empty script
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an immediate response
    #[must_use]
    pub fn respond(self, result: Result<Value, CallError>) -> Self {
        self.respond_after(Duration::ZERO, result)
    }

    /// Queue a response resolved after `delay`
    #[must_use]
    pub fn respond_after(self, delay: Duration, result: Result<Value, CallError>) -> Self {
        self.script
            .lock()
            .unwrap()
            .queue
            .push_back(MockResponse { result, delay });
        self
    }

    /// Response used once the script is exhausted
    #[must_use]
    pub fn otherwise(self, result: Result<Value, CallError>) -> Self {
        self.script.lock().unwrap().fallback = Some(MockResponse {
            result,
            delay: Duration::ZERO,
        });
        self
    }

    /// Call function to register in an `ApiMap`
    #[must_use]
    pub fn call_fn(&self) -> CallFn {
        let script = Arc::clone(&self.script);
        call_fn(move |args: Vec<Value>| {
            let response = {
                let mut script = script.lock().unwrap();
                script.calls.push(args);
                script
                    .queue
                    .pop_front()
                    .or_else(|| script.fallback.clone())
            };
            async move {
                let Some(MockResponse { result, delay }) = response else {
                    return Ok(Value::Null);
                };
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                result
            }
        })
    }

    /// Arguments of every call so far, oldest first
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<Value>> {
        self.script.lock().unwrap().calls.clone()
    }

    /// Number of calls so far
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.script.lock().unwrap().calls.len()
    }

    /// Scripted responses not yet handed out
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().queue.len()
    }
}
