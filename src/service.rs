//! Tracker service
//!
//! Entry point for front-ends: start, stop and list trackers. Also owns the
//! process lifecycle of the engine (restore, background jobs, shutdown).

use crate::aggregator::BalanceAggregator;
use crate::balance::BalanceSource;
use crate::config::{AppConfig, TrackerConfig};
use crate::detector::ChangeDetector;
use crate::error::TrackerResult;
use crate::metrics::MetricsState;
use crate::models::{Tracker, TrackerSpec, TrackerSummary};
use crate::notifications::{NotificationSink, Notifier};
use crate::persistence::{PersistenceManager, RestoreReport, SnapshotStore};
use crate::registry::TrackerRegistry;
use crate::retry::RetryPolicy;
use crate::roles::{QuotaPolicy, Role, RoleLookup};
use crate::scheduler::PollingScheduler;
use crate::sweeper::ExpirySweeper;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// External capabilities the engine consumes
#[derive(Clone)]
pub struct Collaborators {
    pub balances: Arc<dyn BalanceSource>,
    pub roles: Arc<dyn RoleLookup>,
    pub sink: Arc<dyn NotificationSink>,
    pub store: Arc<dyn SnapshotStore>,
}

/// Tracker scheduling and aggregation engine
pub struct TrackerService {
    config: TrackerConfig,
    quotas: QuotaPolicy,
    roles: Arc<dyn RoleLookup>,
    registry: Arc<TrackerRegistry>,
    scheduler: Arc<PollingScheduler>,
    sweeper: Arc<ExpirySweeper>,
    persistence: Arc<PersistenceManager>,
    metrics: Arc<MetricsState>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TrackerService {
    /// Wire the engine components together; nothing runs until [`startup`](Self::startup)
    pub fn new(config: &AppConfig, collaborators: Collaborators, metrics: Arc<MetricsState>) -> Arc<Self> {
        let tracker_config = config.tracker.clone();
        let call_timeout = tracker_config.call_timeout();

        let registry = Arc::new(TrackerRegistry::new());
        let persistence = Arc::new(PersistenceManager::new(
            registry.clone(),
            collaborators.store,
            metrics.clone(),
            tracker_config.snapshot_interval(),
            call_timeout,
            tracker_config.ttl(),
        ));
        let notifier = Arc::new(Notifier::new(collaborators.sink, call_timeout, metrics.clone()));
        let aggregator = Arc::new(BalanceAggregator::new(
            collaborators.balances,
            RetryPolicy::from_config(&config.retry, call_timeout),
        ));
        let detector = Arc::new(ChangeDetector::new(registry.clone(), notifier.clone()));
        let scheduler = Arc::new(PollingScheduler::new(
            registry.clone(),
            aggregator,
            detector,
            metrics.clone(),
            persistence.trigger(),
            tracker_config.poll_interval(),
        ));
        let sweeper = Arc::new(ExpirySweeper::new(
            registry.clone(),
            scheduler.clone(),
            notifier,
            metrics.clone(),
            persistence.trigger(),
            tracker_config.ttl(),
            tracker_config.sweep_interval(),
        ));

        Arc::new(Self {
            config: tracker_config,
            quotas: QuotaPolicy {
                vip: config.roles.vip_quota,
                default: config.roles.default_quota,
            },
            roles: collaborators.roles,
            registry,
            scheduler,
            sweeper,
            persistence,
            metrics,
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    async fn role_of(&self, owner: &str) -> Role {
        match tokio::time::timeout(self.config.call_timeout(), self.roles.role(owner)).await {
            Ok(Ok(role)) => role,
            Ok(Err(e)) => {
                tracing::warn!(owner = owner, error = %e, "Role lookup failed, using default quota");
                Role::Default
            }
            Err(_) => {
                tracing::warn!(owner = owner, "Role lookup timed out, using default quota");
                Role::Default
            }
        }
    }

    /// Create a tracker for `owner` and start polling it
    ///
    /// Fails with `DuplicateTracker` when the owner already tracks this
    /// token/type pair and with `QuotaExceeded` when the owner's role allows
    /// no more trackers.
    pub async fn start_tracking(&self, owner: &str, spec: TrackerSpec) -> TrackerResult<Tracker> {
        let tracker = Tracker::from_spec(owner, spec, Utc::now())?;
        let role = self.role_of(owner).await;
        let quota = self.quotas.quota_for(role);

        if let Err(e) = self.registry.insert(tracker.clone(), quota) {
            tracing::info!(
                owner = owner,
                tracker_id = %tracker.tracker_id,
                role = %role,
                error = %e,
                "Tracker creation rejected"
            );
            return Err(e);
        }

        self.scheduler.arm(tracker.key());
        self.persistence.request_snapshot();

        tracing::info!(
            owner = owner,
            tracker_id = %tracker.tracker_id,
            track_type = %tracker.track_type,
            wallets = tracker.wallets.len(),
            baseline = %tracker.baseline_percentage,
            threshold = %tracker.significant_change_threshold,
            "Tracker started"
        );
        Ok(tracker)
    }

    /// Stop and remove a tracker; false if it did not exist
    pub fn stop_tracking(&self, owner: &str, tracker_id: &str) -> bool {
        let Some(tracker) = self.registry.remove(owner, tracker_id) else {
            return false;
        };
        self.scheduler.disarm(&tracker.key());
        self.persistence.request_snapshot();

        tracing::info!(owner = owner, tracker_id = tracker_id, "Tracker stopped");
        true
    }

    pub fn list_trackers(&self, owner: &str) -> Vec<TrackerSummary> {
        self.registry.list(owner).iter().map(Tracker::summary).collect()
    }

    /// Restore persisted trackers, re-arm them, sweep once and start the jobs
    ///
    /// Call before accepting requests.
    pub async fn startup(self: &Arc<Self>) -> RestoreReport {
        let report = self.persistence.restore().await;
        for key in &report.restored {
            self.scheduler.arm(key.clone());
        }

        let expired = self.sweeper.sweep().await;
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Removed expired trackers after restore");
        }

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(
            self.persistence.clone().run(self.shutdown.child_token()),
        ));
        tasks.push(tokio::spawn(
            self.sweeper.clone().run(self.shutdown.child_token()),
        ));

        tracing::info!(
            trackers = self.registry.len(),
            armed = self.scheduler.armed_count(),
            "Tracker engine started"
        );
        report
    }

    /// Stop all timers and jobs, then write a final snapshot
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down tracker engine");
        self.shutdown.cancel();
        self.scheduler.shutdown();

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Background job ended abnormally");
            }
        }

        match self.persistence.snapshot().await {
            Ok(count) => tracing::info!(trackers = count, "Final snapshot written"),
            Err(e) => tracing::error!(error = %e, "Failed to write final snapshot"),
        }
    }

    pub fn registry(&self) -> &Arc<TrackerRegistry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &Arc<PollingScheduler> {
        &self.scheduler
    }

    pub fn sweeper(&self) -> &Arc<ExpirySweeper> {
        &self.sweeper
    }

    pub fn persistence(&self) -> &Arc<PersistenceManager> {
        &self.persistence
    }

    pub fn metrics(&self) -> &Arc<MetricsState> {
        &self.metrics
    }
}
