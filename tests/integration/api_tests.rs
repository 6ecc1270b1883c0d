//! API Integration Tests
//!
//! Tests REST API endpoints for:
//! - Health check
//! - Starting, listing and stopping trackers
//! - Error mapping (409, 403, 400, 404)
//! - Metrics exposition

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use supply_watch::handlers::{router, AppState};
use tower::ServiceExt;

use crate::support::{engine, TestEngine};

fn app(e: &TestEngine) -> Router {
    router(Arc::new(AppState::new(e.service.clone())), e.metrics.clone())
}

fn start_body(owner: &str, token: &str) -> Value {
    json!({
        "owner": owner,
        "destination": "12345",
        "tokenAddress": token,
        "wallets": ["W1", "W2"],
        "trackType": "team",
        "totalSupply": "1000",
        "decimals": 9,
        "ticker": "TKN",
        "initialPercentage": "10.5",
        "threshold": "0.5"
    })
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

fn post(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/trackers")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// =============================================================================
// HEALTH CHECK TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let e = engine();

    let (status, _) = send(app(&e), get("/health")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(app(&e), get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["trackers"], 0);
    assert!(json["uptime_seconds"].is_number());
}

// =============================================================================
// TRACKER TESTS
// =============================================================================

#[tokio::test]
async fn test_start_list_stop() {
    let e = engine();

    let (status, json) = send(app(&e), post(&start_body("bob", "MINT"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["trackerId"], "MINT:team");
    assert_eq!(json["baselinePercentage"], "10.5");
    assert_eq!(json["significantChangeThreshold"], "0.5");

    let (status, json) = send(app(&e), get("/api/v1/trackers/bob")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    assert_eq!(json["trackers"][0]["trackerId"], "MINT:team");
    assert_eq!(json["trackers"][0]["currentPercentage"], "10.5");
    assert_eq!(json["trackers"][0]["trackType"], "team");

    let (status, json) = send(app(&e), delete("/api/v1/trackers/bob/MINT:team")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stopped"], true);

    let (status, json) = send(app(&e), delete("/api/v1/trackers/bob/MINT:team")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["reason"], "not_found");
}

#[tokio::test]
async fn test_owner_padding_is_ignored_on_every_route() {
    let e = engine();

    let (status, _) = send(app(&e), post(&start_body("bob ", "MINT"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(e.service.list_trackers("bob").len(), 1);

    let (status, json) = send(app(&e), get("/api/v1/trackers/bob%20")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);

    let (status, json) = send(app(&e), delete("/api/v1/trackers/%20bob%20/MINT:team")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stopped"], true);
    assert!(e.service.list_trackers("bob").is_empty());
}

#[tokio::test]
async fn test_duplicate_is_conflict() {
    let e = engine();
    let body = start_body("bob", "MINT");

    let (status, _) = send(app(&e), post(&body)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = send(app(&e), post(&body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["reason"], "duplicate_tracker");
    assert_eq!(json["status"], "rejected");
}

#[tokio::test]
async fn test_quota_is_forbidden() {
    let e = engine();
    for token in ["A", "B"] {
        let (status, _) = send(app(&e), post(&start_body("bob", token))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, json) = send(app(&e), post(&start_body("bob", "C"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["reason"], "quota_exceeded");
}

#[tokio::test]
async fn test_validation_errors() {
    let e = engine();

    let mut body = start_body("bob", "MINT");
    body["threshold"] = json!("0");
    let (status, json) = send(app(&e), post(&body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["reason"], "validation_failed");

    let body = start_body("  ", "MINT");
    let (status, _) = send(app(&e), post(&body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(e.service.registry().is_empty());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let e = engine();
    send(app(&e), post(&start_body("bob", "MINT"))).await;

    let response = app(&e).oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("supply_watch_active_trackers 1"));
}
