//! Tracker state persistence
//!
//! The whole registry is serialized into one JSON document and handed to a
//! [`SnapshotStore`]. Snapshots are written on a fixed cadence and early on
//! request (tracker created, stopped, notified or expired). Restore runs once
//! at startup; unreadable data is never fatal.

pub mod sqlite;

pub use sqlite::SqliteSnapshotStore;

use crate::config::PersistenceConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::metrics::MetricsState;
use crate::models::Tracker;
use crate::registry::TrackerRegistry;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Current snapshot document version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Durable byte store for snapshots
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Replace the stored snapshot
    async fn write_snapshot(&self, bytes: &[u8]) -> TrackerResult<()>;

    /// Last stored snapshot, `None` if nothing was ever written
    async fn read_snapshot(&self) -> TrackerResult<Option<Vec<u8>>>;
}

/// In-memory store (tests and ephemeral runs)
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    data: Mutex<Option<Vec<u8>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with raw bytes
    pub fn with_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Mutex::new(Some(bytes.into())),
        }
    }

    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.data.lock().clone()
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn write_snapshot(&self, bytes: &[u8]) -> TrackerResult<()> {
        *self.data.lock() = Some(bytes.to_vec());
        Ok(())
    }

    async fn read_snapshot(&self) -> TrackerResult<Option<Vec<u8>>> {
        Ok(self.data.lock().clone())
    }
}

/// Open the SQLite store, falling back to memory when the file cannot be used
///
/// Startup never fails on persistence; without a usable file the process
/// still runs, it just forgets its trackers on restart.
pub async fn open_snapshot_store(config: &PersistenceConfig) -> Arc<dyn SnapshotStore> {
    match SqliteSnapshotStore::connect_or_recover(config).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::warn!(
                path = ?config.path,
                error = %e,
                "Snapshot database unavailable, keeping tracker state in memory only"
            );
            Arc::new(MemorySnapshotStore::new())
        }
    }
}

/// Persisted document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub trackers: Vec<Tracker>,
}

impl Snapshot {
    pub fn new(trackers: Vec<Tracker>, saved_at: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at,
            trackers,
        }
    }

    pub fn to_bytes(&self) -> TrackerResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| TrackerError::Persistence(format!("Failed to encode snapshot: {}", e)))
    }

    pub fn from_bytes(bytes: &[u8]) -> TrackerResult<Self> {
        let snapshot: Snapshot = serde_json::from_slice(bytes)
            .map_err(|e| TrackerError::Persistence(format!("Failed to decode snapshot: {}", e)))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(TrackerError::Persistence(format!(
                "Unsupported snapshot version {}",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }
}

/// Cheap handle for asking the persistence job to write early
///
/// Requests made while a write is pending coalesce into one.
#[derive(Debug, Clone, Default)]
pub struct SnapshotTrigger {
    notify: Arc<Notify>,
}

impl SnapshotTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.notify.notify_one();
    }

    async fn requested(&self) {
        self.notify.notified().await
    }
}

/// Summary of a restore pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Trackers put back into the registry
    pub restored: Vec<crate::models::TrackerKey>,
    /// Trackers dropped because they outlived the TTL while the process was down
    pub expired: usize,
    /// Trackers dropped because their stored fields break creation rules
    pub invalid: usize,
}

/// Writes and restores registry snapshots
pub struct PersistenceManager {
    registry: Arc<TrackerRegistry>,
    store: Arc<dyn SnapshotStore>,
    metrics: Arc<MetricsState>,
    trigger: SnapshotTrigger,
    interval: Duration,
    call_timeout: Duration,
    ttl: ChronoDuration,
    // Serializes writers so an older document never lands after a newer one
    write_lock: tokio::sync::Mutex<()>,
}

impl PersistenceManager {
    pub fn new(
        registry: Arc<TrackerRegistry>,
        store: Arc<dyn SnapshotStore>,
        metrics: Arc<MetricsState>,
        interval: Duration,
        call_timeout: Duration,
        ttl: ChronoDuration,
    ) -> Self {
        Self {
            registry,
            store,
            metrics,
            trigger: SnapshotTrigger::new(),
            interval,
            call_timeout,
            ttl,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Handle other components use to request an early snapshot
    pub fn trigger(&self) -> SnapshotTrigger {
        self.trigger.clone()
    }

    pub fn request_snapshot(&self) {
        self.trigger.request();
    }

    /// Write every tracker to the store
    pub async fn snapshot(&self) -> TrackerResult<usize> {
        let _guard = self.write_lock.lock().await;

        let trackers = self.registry.all();
        let count = trackers.len();
        let bytes = Snapshot::new(trackers, Utc::now()).to_bytes()?;

        match tokio::time::timeout(self.call_timeout, self.store.write_snapshot(&bytes)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(TrackerError::Persistence(format!(
                    "Snapshot write timed out after {:?}",
                    self.call_timeout
                )))
            }
        }

        self.metrics.snapshots_total.inc();
        tracing::debug!(trackers = count, bytes = bytes.len(), "Snapshot written");
        Ok(count)
    }

    /// Load the last snapshot into the registry
    ///
    /// Missing or corrupt data leaves the registry empty. Trackers already past
    /// the TTL at `now` are skipped. Timers are armed by the caller.
    pub async fn restore_at(&self, now: DateTime<Utc>) -> RestoreReport {
        let read = match tokio::time::timeout(self.call_timeout, self.store.read_snapshot()).await {
            Ok(result) => result,
            Err(_) => Err(TrackerError::Persistence("Snapshot read timed out".to_string())),
        };

        let bytes = match read {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::warn!("No snapshot found, starting with an empty registry");
                return RestoreReport::default();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read snapshot, starting with an empty registry");
                return RestoreReport::default();
            }
        };

        let snapshot = match Snapshot::from_bytes(&bytes) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "Corrupt snapshot, starting with an empty registry");
                return RestoreReport::default();
            }
        };

        let mut report = RestoreReport::default();
        for tracker in snapshot.trackers {
            if let Err(e) = tracker.validate() {
                tracing::warn!(
                    owner = %tracker.owner,
                    tracker_id = %tracker.tracker_id,
                    error = %e,
                    "Dropping invalid tracker from snapshot"
                );
                report.invalid += 1;
                continue;
            }

            if tracker.is_expired(now, self.ttl) {
                tracing::info!(
                    owner = %tracker.owner,
                    tracker_id = %tracker.tracker_id,
                    "Dropping tracker that expired while offline"
                );
                report.expired += 1;
                continue;
            }

            let key = tracker.key();
            if self.registry.restore(tracker) {
                report.restored.push(key);
            } else {
                tracing::warn!(tracker = %key, "Duplicate tracker in snapshot, keeping the first");
            }
        }

        tracing::info!(
            restored = report.restored.len(),
            expired = report.expired,
            invalid = report.invalid,
            saved_at = %snapshot.saved_at,
            "Restored trackers from snapshot"
        );
        report
    }

    pub async fn restore(&self) -> RestoreReport {
        self.restore_at(Utc::now()).await
    }

    /// Periodic and on-demand snapshot loop; returns on cancellation
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Starting snapshot task"
        );

        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.interval,
            self.interval,
        );
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Snapshot task shutting down");
                    break;
                }
                _ = ticker.tick() => {}
                _ = self.trigger.requested() => {}
            }

            if let Err(e) = self.snapshot().await {
                tracing::warn!(error = %e, "Snapshot failed, retrying next cycle");
            }
        }
    }
}
