//! Metrics for the Elasticsearch storage client
//!
//! Provides Prometheus-compatible metrics through the `metrics` facade.

use metrics::{counter, histogram};
use std::time::{Duration, Instant};

/// Metric names as constants for consistency
pub mod names {
    pub const CLIENT_REQUESTS_TOTAL: &str = "es_client_requests_total";
    pub const CLIENT_REQUEST_LATENCY: &str = "es_client_request_latency_seconds";
    pub const CLIENT_TRANSPORT_ERRORS: &str = "es_client_transport_errors_total";
    pub const CLIENT_BULK_DOCS: &str = "es_client_bulk_docs_total";
    pub const CLIENT_SCAN_PAGES: &str = "es_client_scan_pages_total";
    pub const CLIENT_SNIFF_TOTAL: &str = "es_client_sniff_total";
}

/// Labels for metrics
pub mod labels {
    pub const COMPONENT: &str = "component";
    pub const OPERATION: &str = "operation";
    pub const STATUS: &str = "status";
    pub const INDEX: &str = "index";
    pub const OUTCOME: &str = "outcome";
}

/// Client metrics
#[derive(Debug, Clone)]
pub struct ClientMetrics {
    component: String,
}

impl ClientMetrics {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    /// Record a completed request and its HTTP status
    pub fn record_request(&self, operation: &'static str, status: u16) {
        counter!(
            names::CLIENT_REQUESTS_TOTAL,
            labels::COMPONENT => self.component.clone(),
            labels::OPERATION => operation,
            labels::STATUS => status.to_string(),
        )
        .increment(1);
    }

    /// Record request latency
    pub fn record_latency(&self, operation: &'static str, duration: Duration) {
        histogram!(
            names::CLIENT_REQUEST_LATENCY,
            labels::COMPONENT => self.component.clone(),
            labels::OPERATION => operation,
        )
        .record(duration.as_secs_f64());
    }

    /// Record a request that never got a response
    pub fn record_transport_error(&self, operation: &'static str) {
        counter!(
            names::CLIENT_TRANSPORT_ERRORS,
            labels::COMPONENT => self.component.clone(),
            labels::OPERATION => operation,
        )
        .increment(1);
    }

    /// Record bulk item outcomes
    pub fn record_bulk(&self, index: &str, saved: usize, failed: usize) {
        counter!(
            names::CLIENT_BULK_DOCS,
            labels::COMPONENT => self.component.clone(),
            labels::INDEX => index.to_string(),
            labels::OUTCOME => "saved",
        )
        .increment(saved as u64);
        counter!(
            names::CLIENT_BULK_DOCS,
            labels::COMPONENT => self.component.clone(),
            labels::INDEX => index.to_string(),
            labels::OUTCOME => "failed",
        )
        .increment(failed as u64);
    }

    /// Record a fetched scroll page
    pub fn record_scan_page(&self, index: &str) {
        counter!(
            names::CLIENT_SCAN_PAGES,
            labels::COMPONENT => self.component.clone(),
            labels::INDEX => index.to_string(),
        )
        .increment(1);
    }

    /// Record a node discovery round
    pub fn record_sniff(&self, outcome: &'static str) {
        counter!(
            names::CLIENT_SNIFF_TOTAL,
            labels::COMPONENT => self.component.clone(),
            labels::OUTCOME => outcome,
        )
        .increment(1);
    }
}

/// Timer guard for automatic latency recording
pub struct LatencyTimer<F>
where
    F: FnOnce(Duration),
{
    start: Instant,
    on_drop: Option<F>,
}

impl<F> LatencyTimer<F>
where
    F: FnOnce(Duration),
{
    /// Start a new timer
    pub fn start(on_drop: F) -> Self {
        Self {
            start: Instant::now(),
            on_drop: Some(on_drop),
        }
    }

    /// Stop timer and record
    pub fn stop(mut self) -> Duration {
        let elapsed = self.start.elapsed();
        if let Some(f) = self.on_drop.take() {
            f(elapsed);
        }
        elapsed
    }
}

impl<F> Drop for LatencyTimer<F>
where
    F: FnOnce(Duration),
{
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f(self.start.elapsed());
        }
    }
}
