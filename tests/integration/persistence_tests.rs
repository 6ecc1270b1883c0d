//! Persistence Integration Tests
//!
//! Restarts the engine against the same SQLite file:
//! - Decimal values survive byte-identical
//! - Restored trackers are re-armed
//! - Trackers that expired while offline are dropped
//! - Corrupt snapshots start empty
//! - An unreadable database file is replaced instead of stopping startup

use crate::support::{d, engine_with, spec, StaticRoles};
use chrono::{Duration, Utc};
use std::sync::Arc;
use supply_watch::config::PersistenceConfig;
use supply_watch::persistence::{open_snapshot_store, Snapshot};
use supply_watch::{Quota, SnapshotStore, SqliteSnapshotStore, TrackType, Tracker};

async fn store(dir: &tempfile::TempDir) -> Arc<SqliteSnapshotStore> {
    let config = PersistenceConfig {
        path: dir.path().join("supply_watch.db"),
        max_connections: 2,
    };
    Arc::new(SqliteSnapshotStore::connect(&config).await.unwrap())
}

#[tokio::test]
async fn test_restart_round_trip() {
    let dir = tempfile::tempdir().unwrap();

    let first = engine_with(Arc::new(StaticRoles::default()), store(&dir).await);
    first.service.startup().await;

    let mut precise = spec("mint", TrackType::Team);
    precise.total_supply = d("999999999.000000001");
    precise.initial_percentage = d("33.333333333333333333");
    precise.threshold = d("0.250");
    let tracker = first.service.start_tracking("bob", precise).await.unwrap();
    first
        .service
        .start_tracking("bob", spec("other", TrackType::TopHolders))
        .await
        .unwrap();

    first.service.shutdown().await;

    let second = engine_with(Arc::new(StaticRoles::default()), store(&dir).await);
    let report = second.service.startup().await;
    assert_eq!(report.restored.len(), 2);
    assert_eq!(report.expired, 0);

    let restored = second
        .service
        .registry()
        .get("bob", &tracker.tracker_id)
        .unwrap();
    assert_eq!(restored, tracker);
    assert_eq!(restored.total_supply.to_string(), "999999999.000000001");
    assert_eq!(restored.baseline_percentage.to_string(), "33.333333333333333333");
    assert_eq!(restored.current_percentage.to_string(), "33.333333333333333333");
    assert_eq!(restored.significant_change_threshold.to_string(), "0.250");
    assert_eq!(restored.created_at, tracker.created_at);

    assert!(second.service.scheduler().is_armed(&tracker.key()));
    assert_eq!(second.service.scheduler().armed_count(), 2);

    second.service.shutdown().await;
}

#[tokio::test]
async fn test_offline_expiry_dropped_on_restore() {
    let dir = tempfile::tempdir().unwrap();
    let sqlite = store(&dir).await;

    let now = Utc::now();
    let stale = Tracker::from_spec("bob", spec("old", TrackType::Team), now - Duration::hours(50)).unwrap();
    let live = Tracker::from_spec("bob", spec("new", TrackType::Team), now - Duration::hours(2)).unwrap();
    let bytes = Snapshot::new(vec![stale.clone(), live.clone()], now)
        .to_bytes()
        .unwrap();
    sqlite.write_snapshot(&bytes).await.unwrap();

    let e = engine_with(Arc::new(StaticRoles::default()), sqlite);
    let report = e.service.startup().await;

    assert_eq!(report.restored, vec![live.key()]);
    assert_eq!(report.expired, 1);
    assert!(!e.service.registry().contains(&stale.key()));
    // Dropped on load, so the sweeper never sees it
    assert!(e.sink.sent().is_empty());

    e.service.shutdown().await;
}

#[tokio::test]
async fn test_restore_bypasses_quota() {
    let dir = tempfile::tempdir().unwrap();
    let sqlite = store(&dir).await;

    // Three trackers for a default-role owner, e.g. saved before a downgrade
    let now = Utc::now();
    let trackers: Vec<Tracker> = ["a", "b", "c"]
        .iter()
        .map(|t| Tracker::from_spec("bob", spec(t, TrackType::Team), now).unwrap())
        .collect();
    sqlite
        .write_snapshot(&Snapshot::new(trackers, now).to_bytes().unwrap())
        .await
        .unwrap();

    let e = engine_with(Arc::new(StaticRoles::default()), sqlite);
    e.service.startup().await;
    assert_eq!(e.service.list_trackers("bob").len(), 3);

    // Still over quota for new trackers
    let extra = Tracker::from_spec("bob", spec("d", TrackType::Team), now).unwrap();
    assert!(e.service.registry().insert(extra, Quota::Limited(2)).is_err());

    e.service.shutdown().await;
}

#[tokio::test]
async fn test_corrupt_snapshot_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let sqlite = store(&dir).await;
    sqlite.write_snapshot(b"not a snapshot").await.unwrap();

    let e = engine_with(Arc::new(StaticRoles::default()), sqlite);
    let report = e.service.startup().await;
    assert!(report.restored.is_empty());
    assert!(e.service.registry().is_empty());

    // Engine is usable afterwards
    e.service
        .start_tracking("bob", spec("mint", TrackType::Team))
        .await
        .unwrap();
    e.service.shutdown().await;
}

#[tokio::test]
async fn test_unreadable_database_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let config = PersistenceConfig {
        path: dir.path().join("supply_watch.db"),
        max_connections: 2,
    };
    std::fs::write(&config.path, b"this was never a sqlite database".repeat(64)).unwrap();

    let e = engine_with(Arc::new(StaticRoles::default()), open_snapshot_store(&config).await);
    let report = e.service.startup().await;
    assert!(report.restored.is_empty());
    assert!(e.service.registry().is_empty());

    // The replacement file takes new snapshots
    e.service
        .start_tracking("bob", spec("mint", TrackType::Team))
        .await
        .unwrap();
    e.service.shutdown().await;

    let reopened = SqliteSnapshotStore::connect(&config).await.unwrap();
    let saved = reopened.read_snapshot().await.unwrap().unwrap();
    assert_eq!(Snapshot::from_bytes(&saved).unwrap().trackers.len(), 1);
}

#[tokio::test]
async fn test_unusable_path_falls_back_to_memory() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file").unwrap();
    let config = PersistenceConfig {
        path: blocker.join("supply_watch.db"),
        max_connections: 1,
    };

    let e = engine_with(Arc::new(StaticRoles::default()), open_snapshot_store(&config).await);
    e.service.startup().await;
    e.service
        .start_tracking("bob", spec("mint", TrackType::Team))
        .await
        .unwrap();
    assert_eq!(e.service.list_trackers("bob").len(), 1);
    e.service.shutdown().await;
}
