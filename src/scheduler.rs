//! Per-tracker polling
//!
//! Every armed tracker owns one task driven by a fixed-period interval and a
//! child of the scheduler's shutdown token. A task evaluates its own tracker
//! one tick at a time, so a slow tick is never overlapped by the next one
//! (missed ticks are skipped). Disarming cancels the token; a tick already in
//! flight finishes its I/O but does not write back.

use crate::aggregator::BalanceAggregator;
use crate::detector::{ChangeDetector, DetectOutcome};
use crate::metrics::MetricsState;
use crate::models::TrackerKey;
use crate::persistence::SnapshotTrigger;
use crate::registry::TrackerRegistry;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Result of evaluating one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// New percentage recorded
    Updated { percentage: Decimal, notified: bool },
    /// Aggregation failed; tracker state untouched
    Failed,
    /// Tracker no longer in the registry
    Missing,
    /// Tracker disarmed while the tick was in flight
    Cancelled,
}

struct Handle {
    generation: u64,
    token: CancellationToken,
}

/// Owns the polling timers of all armed trackers
pub struct PollingScheduler {
    registry: Arc<TrackerRegistry>,
    aggregator: Arc<BalanceAggregator>,
    detector: Arc<ChangeDetector>,
    metrics: Arc<MetricsState>,
    snapshots: SnapshotTrigger,
    period: Duration,
    shutdown: CancellationToken,
    handles: Mutex<HashMap<TrackerKey, Handle>>,
    next_generation: AtomicU64,
}

impl PollingScheduler {
    pub fn new(
        registry: Arc<TrackerRegistry>,
        aggregator: Arc<BalanceAggregator>,
        detector: Arc<ChangeDetector>,
        metrics: Arc<MetricsState>,
        snapshots: SnapshotTrigger,
        period: Duration,
    ) -> Self {
        Self {
            registry,
            aggregator,
            detector,
            metrics,
            snapshots,
            period,
            shutdown: CancellationToken::new(),
            handles: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Start polling `key`; the first tick fires one period from now
    ///
    /// Re-arming an armed tracker replaces its timer. Returns false once the
    /// scheduler has shut down.
    pub fn arm(self: &Arc<Self>, key: TrackerKey) -> bool {
        if self.shutdown.is_cancelled() {
            tracing::warn!(tracker = %key, "Scheduler is shut down, not arming tracker");
            return false;
        }

        let token = self.shutdown.child_token();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        {
            let mut handles = self.handles.lock();
            if let Some(previous) = handles.insert(
                key.clone(),
                Handle {
                    generation,
                    token: token.clone(),
                },
            ) {
                previous.token.cancel();
            }
            self.metrics.active_trackers.set(handles.len() as i64);
        }

        tracing::debug!(tracker = %key, period_secs = self.period.as_secs(), "Tracker armed");

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.poll_loop(key, token, generation).await;
        });

        true
    }

    /// Stop polling `key`; false if it was not armed
    pub fn disarm(&self, key: &TrackerKey) -> bool {
        let mut handles = self.handles.lock();
        let Some(handle) = handles.remove(key) else {
            return false;
        };
        handle.token.cancel();
        self.metrics.active_trackers.set(handles.len() as i64);
        tracing::debug!(tracker = %key, "Tracker disarmed");
        true
    }

    pub fn is_armed(&self, key: &TrackerKey) -> bool {
        self.handles.lock().contains_key(key)
    }

    pub fn armed_count(&self) -> usize {
        self.handles.lock().len()
    }

    /// Cancel every timer; later `arm` calls are refused
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let mut handles = self.handles.lock();
        let count = handles.len();
        handles.clear();
        self.metrics.active_trackers.set(0);
        tracing::info!(trackers = count, "Polling scheduler stopped");
    }

    async fn poll_loop(self: Arc<Self>, key: TrackerKey, token: CancellationToken, generation: u64) {
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if self.evaluate(&key, &token).await == TickOutcome::Missing {
                        tracing::debug!(tracker = %key, "Tracker removed, stopping its timer");
                        self.forget(&key, generation);
                        break;
                    }
                }
            }
        }
    }

    // Drop the handle only if it still belongs to this task
    fn forget(&self, key: &TrackerKey, generation: u64) {
        let mut handles = self.handles.lock();
        if handles.get(key).map(|h| h.generation) == Some(generation) {
            handles.remove(key);
            self.metrics.active_trackers.set(handles.len() as i64);
        }
    }

    /// Run one tick for `key` now
    pub async fn tick(&self, key: &TrackerKey) -> TickOutcome {
        self.evaluate(key, &self.shutdown).await
    }

    async fn evaluate(&self, key: &TrackerKey, token: &CancellationToken) -> TickOutcome {
        let Some(tracker) = self.registry.get(&key.owner, &key.tracker_id) else {
            return TickOutcome::Missing;
        };

        let started = Instant::now();
        let result = self
            .aggregator
            .aggregate(
                &tracker.wallets,
                &tracker.token_address,
                tracker.total_supply,
                tracker.decimals,
            )
            .await;
        self.metrics
            .tick_latency
            .observe(started.elapsed().as_secs_f64() * 1000.0);

        let aggregation = match result {
            Ok(aggregation) => aggregation,
            Err(e) => {
                self.metrics.tick_failures_total.inc();
                tracing::warn!(
                    tracker_id = %tracker.tracker_id,
                    owner = %tracker.owner,
                    track_type = %tracker.track_type,
                    token = %tracker.token_address,
                    error = %e,
                    "Poll tick failed, keeping previous percentage"
                );
                return TickOutcome::Failed;
            }
        };

        if token.is_cancelled() {
            tracing::debug!(tracker = %key, "Tracker disarmed during tick, discarding result");
            return TickOutcome::Cancelled;
        }

        self.metrics.ticks_total.inc();
        let percentage = aggregation.percentage;

        match self.detector.detect(&tracker, percentage).await {
            DetectOutcome::Missing => TickOutcome::Missing,
            DetectOutcome::Unchanged => TickOutcome::Updated {
                percentage,
                notified: false,
            },
            DetectOutcome::Notified { .. } => {
                self.snapshots.request();
                TickOutcome::Updated {
                    percentage,
                    notified: true,
                }
            }
        }
    }
}
