//! Expiry Integration Tests
//!
//! - A tracker 49h old (TTL 48h) is notified once, then removed
//! - Ticks against a swept tracker are no-ops

use crate::support::{engine, spec};
use chrono::{Duration, Utc};
use supply_watch::{TickOutcome, TrackType};

#[tokio::test]
async fn test_sweep_after_ttl() {
    let e = engine();
    let tracker = e
        .service
        .start_tracking("bob", spec("mint", TrackType::Team))
        .await
        .unwrap();
    let key = tracker.key();

    let later = tracker.created_at + Duration::hours(49);
    let removed = e.service.sweeper().sweep_at(later).await;
    assert_eq!(removed, vec![key.clone()]);

    let sent = e.sink.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "chat-mint");
    assert!(sent[0].1.contains("MINT"));

    assert!(e.service.list_trackers("bob").is_empty());
    assert!(!e.service.scheduler().is_armed(&key));
    assert_eq!(e.metrics.expired_total.get(), 1);

    // Already gone: stop and tick are harmless
    assert!(!e.service.stop_tracking("bob", &tracker.tracker_id));
    assert_eq!(e.service.scheduler().tick(&key).await, TickOutcome::Missing);
    assert!(e.service.sweeper().sweep_at(later).await.is_empty());
    assert_eq!(e.sink.sent().len(), 1);
}

#[tokio::test]
async fn test_young_trackers_survive() {
    let e = engine();
    e.service
        .start_tracking("bob", spec("mint", TrackType::Team))
        .await
        .unwrap();

    let removed = e
        .service
        .sweeper()
        .sweep_at(Utc::now() + Duration::hours(47))
        .await;
    assert!(removed.is_empty());
    assert_eq!(e.service.list_trackers("bob").len(), 1);
    assert!(e.sink.sent().is_empty());
}

#[tokio::test]
async fn test_stopped_tracker_gets_no_expiry_notice() {
    let e = engine();
    let tracker = e
        .service
        .start_tracking("bob", spec("mint", TrackType::Team))
        .await
        .unwrap();
    assert!(e.service.stop_tracking("bob", &tracker.tracker_id));

    let removed = e
        .service
        .sweeper()
        .sweep_at(Utc::now() + Duration::hours(100))
        .await;
    assert!(removed.is_empty());
    assert!(e.sink.sent().is_empty());
}
