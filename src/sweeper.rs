//! Expiry sweeper
//!
//! Removes trackers older than the TTL. The owner is notified before removal
//! and the tracker's timer is cancelled afterwards. Sweeps are serialized so a
//! tracker can only ever produce one expiry notice.

use crate::metrics::MetricsState;
use crate::models::TrackerKey;
use crate::notifications::{Notifier, TrackerEvent};
use crate::persistence::SnapshotTrigger;
use crate::registry::TrackerRegistry;
use crate::scheduler::PollingScheduler;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Periodic TTL enforcement
pub struct ExpirySweeper {
    registry: Arc<TrackerRegistry>,
    scheduler: Arc<PollingScheduler>,
    notifier: Arc<Notifier>,
    metrics: Arc<MetricsState>,
    snapshots: SnapshotTrigger,
    ttl: ChronoDuration,
    interval: Duration,
    sweep_lock: tokio::sync::Mutex<()>,
}

impl ExpirySweeper {
    pub fn new(
        registry: Arc<TrackerRegistry>,
        scheduler: Arc<PollingScheduler>,
        notifier: Arc<Notifier>,
        metrics: Arc<MetricsState>,
        snapshots: SnapshotTrigger,
        ttl: ChronoDuration,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            scheduler,
            notifier,
            metrics,
            snapshots,
            ttl,
            interval,
            sweep_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Remove every tracker expired at `now`; returns the removed keys
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Vec<TrackerKey> {
        let _guard = self.sweep_lock.lock().await;

        let expired = self.registry.expired(now, self.ttl);
        if expired.is_empty() {
            return Vec::new();
        }

        tracing::info!(count = expired.len(), "Found expired trackers");

        let mut removed = Vec::with_capacity(expired.len());
        for tracker in expired {
            let key = tracker.key();

            // Stopped, or stopped and re-created, since the scan
            let live = self.registry.get(&key.owner, &key.tracker_id);
            if !live.is_some_and(|live| live.same_instance(&tracker)) {
                continue;
            }

            let event = TrackerEvent::Expired {
                ticker: tracker.ticker.clone(),
                token_address: tracker.token_address.clone(),
                track_type: tracker.track_type,
                ttl_hours: self.ttl.num_hours(),
            };
            self.notifier.notify(&tracker.destination, &event).await;

            // The owner may have replaced it while the notice was in flight
            let removed_expired = self
                .registry
                .remove_if(&key.owner, &key.tracker_id, |live| live.same_instance(&tracker))
                .is_some();

            if removed_expired {
                self.scheduler.disarm(&key);
                self.metrics.expired_total.inc();
                tracing::info!(
                    owner = %key.owner,
                    tracker_id = %key.tracker_id,
                    created_at = %tracker.created_at,
                    "Tracker expired"
                );
                removed.push(key);
            }
        }

        if !removed.is_empty() {
            self.snapshots.request();
        }
        removed
    }

    pub async fn sweep(&self) -> Vec<TrackerKey> {
        self.sweep_at(Utc::now()).await
    }

    /// Hourly sweep loop; the first sweep happens one interval from now
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!(
            ttl_hours = self.ttl.num_hours(),
            interval_secs = self.interval.as_secs(),
            "Starting expiry sweeper"
        );

        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.interval,
            self.interval,
        );
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Expiry sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }
    }
}
