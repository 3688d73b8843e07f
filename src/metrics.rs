//! Prometheus metrics collection for prompt-router
//!
//! This module provides metrics instrumentation for tracking:
//! - Forwarding attempts by route
//! - Backend round-trip latency by route
//! - Backend failures by route and failure kind
//!
//! Metrics are exposed via the `/metrics` endpoint in Prometheus text format.
//! `Metrics` is the router's [`RouteObserver`]: attempts are recorded whether
//! the backend succeeded or failed.

use crate::router::{AttemptStatus, RouteObserver};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

/// Latency buckets in seconds, sized for generation calls rather than RPCs
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Metrics collector for prompt-router
///
/// Owns its own registry (not the process-global default) so independent
/// instances can coexist in tests.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    requests_total: IntCounterVec,
    request_latency: HistogramVec,
    backend_failures: IntCounterVec,
    metrics_recording_failures: IntCounterVec,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// Registers all metrics with a new Prometheus registry.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Counter: forwarding attempts by route, success or failure.
        // Cardinality is bounded by the route table.
        let requests_total = IntCounterVec::new(
            Opts::new(
                "prompt_router_requests_total",
                "Total prompts forwarded to a backend, by route",
            ),
            &["version"],
        )?;

        let request_latency = HistogramVec::new(
            HistogramOpts::new(
                "prompt_router_request_latency_seconds",
                "Backend round-trip time in seconds, by route",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["version"],
        )?;

        // Counter: failed attempts by route and kind (timeout, transport, status, malformed_body)
        let backend_failures = IntCounterVec::new(
            Opts::new(
                "prompt_router_backend_failures_total",
                "Total failed forwarding attempts, by route and failure kind",
            ),
            &["version", "kind"],
        )?;

        let metrics_recording_failures = IntCounterVec::new(
            Opts::new(
                "prompt_router_metrics_recording_failures_total",
                "Total number of metrics recording operation failures by operation. \
                Indicates Prometheus internal errors - frequent failures require investigation.",
            ),
            &["operation"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_latency.clone()))?;
        registry.register(Box::new(backend_failures.clone()))?;
        registry.register(Box::new(metrics_recording_failures.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            requests_total,
            request_latency,
            backend_failures,
            metrics_recording_failures,
        })
    }

    /// Record one forwarding attempt for `route`
    ///
    /// # Errors
    ///
    /// Returns an error if the metric is not registered.
    pub fn record_request(&self, route: &str) -> Result<(), prometheus::Error> {
        self.requests_total
            .get_metric_with_label_values(&[route])?
            .inc();
        Ok(())
    }

    /// Record the backend round-trip time for `route`
    ///
    /// # Errors
    ///
    /// Returns an error if `seconds` is NaN, infinite, or negative. Such values
    /// would corrupt every percentile derived from the histogram.
    pub fn record_latency(&self, route: &str, seconds: f64) -> Result<(), prometheus::Error> {
        if !seconds.is_finite() {
            return Err(prometheus::Error::Msg(format!(
                "Histogram value must be finite (not NaN or Infinity), got: {}",
                seconds
            )));
        }

        if seconds < 0.0 {
            return Err(prometheus::Error::Msg(format!(
                "Histogram value must be non-negative (duration cannot be negative), got: {}",
                seconds
            )));
        }

        self.request_latency
            .get_metric_with_label_values(&[route])?
            .observe(seconds);
        Ok(())
    }

    /// Record a failed forwarding attempt for `route`
    pub fn record_backend_failure(&self, route: &str, kind: &str) -> Result<(), prometheus::Error> {
        self.backend_failures
            .get_metric_with_label_values(&[route, kind])?
            .inc();
        Ok(())
    }

    /// Record a metrics recording operation failure
    ///
    /// `operation` is one of `record_request`, `record_latency`, `record_backend_failure`.
    pub fn metrics_recording_failure(&self, operation: &str) {
        self.metrics_recording_failures
            .with_label_values(&[operation])
            .inc();
    }

    /// Number of forwarding attempts recorded for `route`
    pub fn request_count(&self, route: &str) -> u64 {
        self.requests_total
            .get_metric_with_label_values(&[route])
            .map(|counter| counter.get())
            .unwrap_or(0)
    }

    /// Number of latency observations recorded for `route`
    pub fn latency_sample_count(&self, route: &str) -> u64 {
        self.request_latency
            .get_metric_with_label_values(&[route])
            .map(|histogram| histogram.get_sample_count())
            .unwrap_or(0)
    }

    /// Number of failed attempts recorded for `route`, across all failure kinds
    pub fn backend_failure_count(&self, route: &str) -> u64 {
        ["timeout", "transport", "status", "malformed_body"]
            .into_iter()
            .filter_map(|kind| {
                self.backend_failures
                    .get_metric_with_label_values(&[route, kind])
                    .ok()
            })
            .map(|counter| counter.get())
            .sum()
    }

    /// Get the current count of metrics recording failures across all operations
    ///
    /// Used by the /health endpoint to report metrics system status.
    pub fn metrics_recording_failures_count(&self) -> u64 {
        let metric_families = self.registry.gather();
        metric_families
            .iter()
            .find(|mf| mf.name() == "prompt_router_metrics_recording_failures_total")
            .map(|mf| {
                mf.get_metric()
                    .iter()
                    .map(|m| m.counter.value.unwrap_or(0.0) as u64)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Encode all registered metrics in Prometheus text format
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the output is not valid UTF-8.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();

        tracing::debug!(
            metric_family_count = metric_families.len(),
            "Encoding metrics to Prometheus text format"
        );

        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder.encode(&metric_families, &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("Prometheus output is not valid UTF-8: {}", e))
        })
    }

    // Recording errors are logged and counted, never propagated.
    fn log_recording_error(&self, operation: &str, route: &str, err: prometheus::Error) {
        tracing::error!(
            error = %err,
            operation,
            route = %route,
            "Metrics recording failed (non-fatal). Request will continue."
        );
        self.metrics_recording_failure(operation);
    }
}

impl RouteObserver for Metrics {
    fn attempt_completed(&self, route: &str, latency: Duration, status: AttemptStatus<'_>) {
        if let Err(e) = self.record_request(route) {
            self.log_recording_error("record_request", route, e);
        }

        if let Err(e) = self.record_latency(route, latency.as_secs_f64()) {
            self.log_recording_error("record_latency", route, e);
        }

        if let AttemptStatus::Failed(error) = status {
            if let Err(e) = self.record_backend_failure(route, error.kind()) {
                self.log_recording_error("record_backend_failure", route, e);
            }
        }
    }
}
