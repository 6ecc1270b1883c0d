//! Health check endpoint

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::service::TrackerService;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall system status
    pub status: HealthStatus,
    /// Uptime in seconds
    pub uptime_seconds: i64,
    /// Trackers in the registry
    pub trackers: usize,
    /// Trackers with a live polling timer
    pub armed: usize,
}

/// Health status enum
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// Registry and timers disagree
    Degraded,
}

/// Shared application state
pub struct AppState {
    /// Tracker engine
    pub service: Arc<TrackerService>,
    /// Application start time
    pub started_at: chrono::DateTime<Utc>,
}

impl AppState {
    pub fn new(service: Arc<TrackerService>) -> Self {
        Self {
            service,
            started_at: Utc::now(),
        }
    }
}

/// Health check handler
///
/// GET /api/v1/health
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    let trackers = state.service.registry().len();
    let armed = state.service.scheduler().armed_count();

    let status = if armed < trackers {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    (
        StatusCode::OK,
        Json(HealthResponse {
            status,
            uptime_seconds: uptime,
            trackers,
            armed,
        }),
    )
}

/// Simple health check (for load balancers)
///
/// GET /health
pub async fn health_simple() -> StatusCode {
    StatusCode::OK
}
