//! Change Detection Unit Tests
//!
//! Drives ticks by hand against scripted balances:
//! - Threshold steps fire exactly once per tick
//! - Rebasing suppresses repeats
//! - Partial and total lookup failures

use crate::support::{d, engine, spec};
use supply_watch::detector::apply_observation;
use supply_watch::{TickOutcome, TrackType, Tracker};

// 9 decimals, supply 1000: raw per 1% of supply
const ONE_PERCENT_RAW: u64 = 10_000_000_000;

#[tokio::test]
async fn test_example_below_threshold() {
    let e = engine();
    let tracker = e
        .service
        .start_tracking("bob", spec("mint", TrackType::Team))
        .await
        .unwrap();
    let key = tracker.key();

    // 10.9% split across both wallets
    e.balances.set("W1", 100_000_000_000);
    e.balances.set("W2", 9_000_000_000);

    let outcome = e.service.scheduler().tick(&key).await;
    assert_eq!(
        outcome,
        TickOutcome::Updated {
            percentage: d("10.9"),
            notified: false
        }
    );

    let stored = e.service.registry().get("bob", &tracker.tracker_id).unwrap();
    assert_eq!(stored.current_percentage, d("10.9"));
    assert_eq!(stored.baseline_percentage, d("10"));
    assert!(e.sink.sent().is_empty());
}

#[tokio::test]
async fn test_increasing_by_threshold_notifies_every_tick() {
    let e = engine();
    let tracker = e
        .service
        .start_tracking("bob", spec("mint", TrackType::Team))
        .await
        .unwrap();
    let key = tracker.key();

    for step in 1..=5u64 {
        e.balances.set("W1", (10 + step) * ONE_PERCENT_RAW);
        let outcome = e.service.scheduler().tick(&key).await;
        assert!(matches!(outcome, TickOutcome::Updated { notified: true, .. }));
    }

    let sent = e.sink.sent();
    assert_eq!(sent.len(), 5);
    assert!(sent.iter().all(|(dest, _)| dest == "chat-mint"));
    assert!(sent[0].1.contains("increased"));
}

#[tokio::test]
async fn test_reobservation_after_notice_is_quiet() {
    let e = engine();
    let tracker = e
        .service
        .start_tracking("bob", spec("mint", TrackType::Team))
        .await
        .unwrap();
    let key = tracker.key();

    e.balances.set("W1", 5 * ONE_PERCENT_RAW);
    assert!(matches!(
        e.service.scheduler().tick(&key).await,
        TickOutcome::Updated { notified: true, .. }
    ));
    assert!(matches!(
        e.service.scheduler().tick(&key).await,
        TickOutcome::Updated { notified: false, .. }
    ));

    let sent = e.sink.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("decreased"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_wallet_counts_as_zero() {
    let e = engine();
    let tracker = e
        .service
        .start_tracking("bob", spec("mint", TrackType::Team))
        .await
        .unwrap();

    e.balances.set("W1", 10 * ONE_PERCENT_RAW);
    e.balances.set("W2", 3 * ONE_PERCENT_RAW);
    e.balances.fail("W2");

    let outcome = e.service.scheduler().tick(&tracker.key()).await;
    assert_eq!(
        outcome,
        TickOutcome::Updated {
            percentage: d("10"),
            notified: false
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_all_wallets_failing_keeps_state() {
    let e = engine();
    let tracker = e
        .service
        .start_tracking("bob", spec("mint", TrackType::Team))
        .await
        .unwrap();
    e.balances.fail("W1");
    e.balances.fail("W2");

    assert_eq!(
        e.service.scheduler().tick(&tracker.key()).await,
        TickOutcome::Failed
    );
    let stored = e.service.registry().get("bob", &tracker.tracker_id).unwrap();
    assert_eq!(stored, tracker);
    assert!(e.service.scheduler().is_armed(&tracker.key()));
    assert_eq!(e.metrics.tick_failures_total.get(), 1);
}

#[test]
fn test_fractional_threshold_steps_are_exact() {
    let mut spec = spec("mint", TrackType::TopHolders);
    spec.initial_percentage = d("0");
    spec.threshold = d("0.001");
    let mut tracker = Tracker::from_spec("bob", spec, chrono::Utc::now()).unwrap();

    let mut pct = d("0");
    for _ in 0..1000 {
        pct += d("0.001");
        assert!(apply_observation(&mut tracker, pct).is_some());
        assert!(apply_observation(&mut tracker, pct).is_none());
    }
    assert_eq!(tracker.baseline_percentage, d("1"));
}
