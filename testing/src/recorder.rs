//! Recording of broadcast events
//!
//! [`EventRecorder`] subscribes to a store and keeps every event it
//! broadcasts, so tests can assert on the exact sequence a scenario
//! produced.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Only panics on a poisoned lock

use rascl_core::action::LifecycleEvent;
use rascl_runtime::{RuntimeError, Store};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Collects every event a store broadcasts
///
/// Recording starts when the recorder is created and stops when it is
/// dropped.
#[derive(Debug)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<LifecycleEvent>>>,
    recorded: watch::Receiver<usize>,
    task: JoinHandle<()>,
}

impl EventRecorder {
    /// Subscribe to `store` and start recording
    ///
    /// Must be called inside a Tokio runtime.
    #[must_use]
    pub fn start(store: &Store) -> Self {
        let mut rx = store.subscribe_actions();
        let events = Arc::new(Mutex::new(Vec::new()));
        let (count, recorded) = watch::channel(0);

        let sink = Arc::clone(&events);
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let len = {
                            let mut events = sink.lock().unwrap();
                            events.push(event);
                            events.len()
                        };
                        count.send_replace(len);
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event recorder lagged");
                    },
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Self {
            events,
            recorded,
            task,
        }
    }

    /// Every event recorded so far
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Types of every event recorded so far
    #[must_use]
    pub fn types(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }

    /// Number of recorded events of `event_type`
    #[must_use]
    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    /// Wait until a recorded event matches `predicate`
    ///
    /// Events recorded before the call are checked too.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::Timeout`]: nothing matched within `timeout`
    /// - [`RuntimeError::ChannelClosed`]: the store's broadcast closed
    pub async fn wait_for<F>(&self, predicate: F, timeout: Duration) -> Result<LifecycleEvent, RuntimeError>
    where
        F: Fn(&LifecycleEvent) -> bool,
    {
        let mut recorded = self.recorded.clone();
        tokio::time::timeout(timeout, async {
            loop {
                let found = self.events.lock().unwrap().iter().find(|e| predicate(e)).cloned();
                if let Some(event) = found {
                    return Ok(event);
                }
                if recorded.changed().await.is_err() {
                    return Err(RuntimeError::ChannelClosed);
                }
            }
        })
        .await
        .map_err(|_| RuntimeError::Timeout)?
    }
}

impl Drop for EventRecorder {
    fn drop(&mut self) {
        self.task.abort();
    }
}
