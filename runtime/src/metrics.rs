//! Prometheus metrics for observability and monitoring.
//!
//! The runtime records through the `metrics` facade; nothing is exported
//! unless a recorder is installed. [`MetricsServer`] installs a Prometheus
//! recorder and renders the text exposition on demand.
//!
//! | metric | kind | labels |
//! |---|---|---|
//! | `rascl_events_total` | counter | `phase` |
//! | `rascl_reducer_duration_seconds` | histogram | |
//! | `rascl_workers_started_total` | counter | `endpoint` |
//! | `rascl_workers_superseded_total` | counter | `endpoint` |
//! | `rascl_outcomes_total` | counter | `endpoint`, `category` |
//! | `rascl_watcher_restarts_total` | counter | `endpoint` |
//!
//! # Example
//!
//! ```rust,no_run
//! use rascl_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! println!("{}", server.render().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics recorder with a render handle.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// `addr` is only reported in logs; serving the rendered text is left
    /// to the host application.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built or installed.
    /// A recorder that is already installed (common in tests) is not an error.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!("rascl_events_total", "Lifecycle events applied by the store");
    describe_histogram!(
        "rascl_reducer_duration_seconds",
        "Time spent applying one event through the reducer"
    );
    describe_counter!("rascl_workers_started_total", "Request workers started");
    describe_counter!(
        "rascl_workers_superseded_total",
        "Workers whose result was dropped because a newer request arrived"
    );
    describe_counter!("rascl_outcomes_total", "Terminal outcomes dispatched by workers");
    describe_counter!("rascl_watcher_restarts_total", "Endpoint watchers restarted after a failure");
}

/// Store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record an applied event.
    pub fn record_event(phase: &'static str, duration: Duration) {
        counter!("rascl_events_total", "phase" => phase).increment(1);
        histogram!("rascl_reducer_duration_seconds").record(duration.as_secs_f64());
    }
}

/// Worker metrics recorder.
pub struct WorkerMetrics;

impl WorkerMetrics {
    /// Record a worker start.
    pub fn record_start(endpoint: &str) {
        counter!("rascl_workers_started_total", "endpoint" => endpoint.to_string()).increment(1);
    }

    /// Record a worker whose result was discarded.
    pub fn record_superseded(endpoint: &str) {
        counter!("rascl_workers_superseded_total", "endpoint" => endpoint.to_string())
            .increment(1);
    }

    /// Record a dispatched terminal outcome.
    pub fn record_outcome(endpoint: &str, category: &'static str) {
        counter!(
            "rascl_outcomes_total",
            "endpoint" => endpoint.to_string(),
            "category" => category
        )
        .increment(1);
    }
}

/// Supervisor metrics recorder.
pub struct SupervisorMetrics;

impl SupervisorMetrics {
    /// Record a watcher restart.
    pub fn record_restart(endpoint: &str) {
        counter!("rascl_watcher_restarts_total", "endpoint" => endpoint.to_string()).increment(1);
    }
}
