//! Tracker API handlers
//!
//! - `POST   /api/v1/trackers`                     start tracking
//! - `GET    /api/v1/trackers/:owner`              list an owner's trackers
//! - `DELETE /api/v1/trackers/:owner/:tracker_id`  stop tracking

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{Tracker, TrackerSpec, TrackerSummary};

/// Body of a start request
#[derive(Debug, Deserialize)]
pub struct StartTrackerRequest {
    /// Owning user
    pub owner: String,
    #[serde(flatten)]
    pub spec: TrackerSpec,
}

/// Response for tracker list
#[derive(Debug, Serialize, Deserialize)]
pub struct TrackersResponse {
    pub trackers: Vec<TrackerSummary>,
    pub total: usize,
}

/// Response for stop
#[derive(Debug, Serialize, Deserialize)]
pub struct StopResponse {
    pub tracker_id: String,
    pub stopped: bool,
}

fn require(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Start tracking
///
/// POST /api/v1/trackers
pub async fn start_tracker(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartTrackerRequest>,
) -> AppResult<(StatusCode, Json<Tracker>)> {
    require("owner", &request.owner)?;
    require("destination", &request.spec.destination)?;
    require("tokenAddress", &request.spec.token_address)?;

    let tracker = state
        .service
        .start_tracking(request.owner.trim(), request.spec)
        .await?;

    Ok((StatusCode::CREATED, Json(tracker)))
}

/// List an owner's trackers
///
/// GET /api/v1/trackers/:owner
pub async fn list_trackers(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
) -> Json<TrackersResponse> {
    let trackers = state.service.list_trackers(owner.trim());
    let total = trackers.len();
    Json(TrackersResponse { trackers, total })
}

/// Stop tracking
///
/// DELETE /api/v1/trackers/:owner/:tracker_id
pub async fn stop_tracker(
    State(state): State<Arc<AppState>>,
    Path((owner, tracker_id)): Path<(String, String)>,
) -> AppResult<Json<StopResponse>> {
    let owner = owner.trim();
    if !state.service.stop_tracking(owner, &tracker_id) {
        return Err(AppError::NotFound(format!(
            "Tracker {} not found for {}",
            tracker_id, owner
        )));
    }

    Ok(Json(StopResponse {
        tracker_id,
        stopped: true,
    }))
}
