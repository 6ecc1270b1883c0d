//! HTTP handlers for Supply Watch

mod health;
mod trackers;

pub use health::*;
pub use trackers::*;

use crate::metrics::{metrics_router, MetricsState};
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the full application router
pub fn router(state: Arc<AppState>, metrics: Arc<MetricsState>) -> Router {
    let tracker_routes = Router::new()
        .route("/trackers", post(start_tracker))
        .route("/trackers/:owner", get(list_trackers))
        .route("/trackers/:owner/:tracker_id", delete(stop_tracker))
        .route("/health", get(health_check))
        .with_state(state);

    // Simple health check for load balancers
    let root_routes = Router::new().route("/health", get(health_simple));

    Router::new()
        .nest("/api/v1", tracker_routes)
        .merge(root_routes)
        .merge(metrics_router().with_state(metrics))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
