//! Polling Integration Tests
//!
//! Runs the real timers on a paused clock:
//! - First poll one period after creation
//! - Significant change reaches the destination
//! - Stop cancels further polling

use crate::support::{d, engine, spec};
use std::time::Duration;
use supply_watch::TrackType;

const ONE_PERCENT_RAW: u64 = 10_000_000_000;

#[tokio::test(start_paused = true)]
async fn test_timer_drives_notifications() {
    let e = engine();
    e.balances.set("W1", 10 * ONE_PERCENT_RAW);

    let tracker = e
        .service
        .start_tracking("bob", spec("mint", TrackType::Team))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(e.balances.calls(), 0);

    // First tick at 60s: both wallets looked up, no move
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(e.balances.calls(), 2);
    assert!(e.sink.sent().is_empty());

    // Holder dumps half; the next tick reports it
    e.balances.set("W1", 5 * ONE_PERCENT_RAW);
    tokio::time::sleep(Duration::from_secs(60)).await;

    let sent = e.sink.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("decreased"));

    let stored = e.service.registry().get("bob", &tracker.tracker_id).unwrap();
    assert_eq!(stored.baseline_percentage, d("5"));
    assert_eq!(stored.current_percentage, d("5"));
    assert_eq!(e.metrics.ticks_total.get(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_polling() {
    let e = engine();
    let tracker = e
        .service
        .start_tracking("bob", spec("mint", TrackType::Team))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(e.balances.calls(), 2);

    assert!(e.service.stop_tracking("bob", &tracker.tracker_id));
    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(e.balances.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_everything() {
    let e = engine();
    e.service.startup().await;
    e.service
        .start_tracking("bob", spec("mint", TrackType::Team))
        .await
        .unwrap();

    e.service.shutdown().await;
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(e.balances.calls(), 0);
    assert_eq!(e.service.scheduler().armed_count(), 0);
}
