//! Prometheus metrics for Supply Watch
//!
//! Exposes metrics endpoint for monitoring:
//! - Active tracker gauge
//! - Poll tick counters and latency
//! - Notification delivery counters
//! - Expiry and snapshot counters

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metrics state
pub struct MetricsState {
    /// Prometheus registry
    registry: Registry,
    /// Trackers currently armed
    pub active_trackers: IntGauge,
    /// Completed poll ticks
    pub ticks_total: IntCounter,
    /// Poll ticks that failed (retry exhausted, invalid supply)
    pub tick_failures_total: IntCounter,
    /// Poll tick latency (in milliseconds)
    pub tick_latency: Histogram,
    /// Notifications delivered
    pub notifications_total: IntCounter,
    /// Notifications that could not be delivered
    pub delivery_failures_total: IntCounter,
    /// Trackers removed by the expiry sweeper
    pub expired_total: IntCounter,
    /// Snapshots written
    pub snapshots_total: IntCounter,
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::with_opts(Opts::new(name, help))
        .unwrap_or_else(|e| panic!("Failed to create {}: {}", name, e));
    registry
        .register(Box::new(counter.clone()))
        .unwrap_or_else(|e| panic!("Failed to register {}: {}", name, e));
    counter
}

impl MetricsState {
    /// Create a new metrics state with all metrics registered
    pub fn new() -> Self {
        let registry = Registry::new();

        let active_trackers = IntGauge::with_opts(Opts::new(
            "supply_watch_active_trackers",
            "Number of armed trackers",
        ))
        .expect("Failed to create active_trackers gauge");
        registry
            .register(Box::new(active_trackers.clone()))
            .expect("Failed to register active_trackers");

        let tick_latency = Histogram::with_opts(
            HistogramOpts::new(
                "supply_watch_tick_latency_ms",
                "Poll tick latency in milliseconds",
            )
            .buckets(vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0, 30000.0]),
        )
        .expect("Failed to create tick_latency histogram");
        registry
            .register(Box::new(tick_latency.clone()))
            .expect("Failed to register tick_latency");

        let ticks_total = counter(&registry, "supply_watch_ticks_total", "Completed poll ticks");
        let tick_failures_total = counter(
            &registry,
            "supply_watch_tick_failures_total",
            "Poll ticks that produced no observation",
        );
        let notifications_total = counter(
            &registry,
            "supply_watch_notifications_total",
            "Notifications delivered",
        );
        let delivery_failures_total = counter(
            &registry,
            "supply_watch_delivery_failures_total",
            "Notifications that failed to deliver",
        );
        let expired_total = counter(
            &registry,
            "supply_watch_expired_total",
            "Trackers removed after their lifetime",
        );
        let snapshots_total = counter(
            &registry,
            "supply_watch_snapshots_total",
            "Tracker snapshots written",
        );

        Self {
            registry,
            active_trackers,
            ticks_total,
            tick_failures_total,
            tick_latency,
            notifications_total,
            delivery_failures_total,
            expired_total,
            snapshots_total,
        }
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for MetricsState {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics handler - returns Prometheus metrics in text format
///
/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<MetricsState>>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = state.registry().gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("Content-Type", "text/plain; version=0.0.4")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        buffer,
    )
}

/// Create metrics router
pub fn metrics_router() -> Router<Arc<MetricsState>> {
    Router::new().route("/metrics", get(metrics_handler))
}
