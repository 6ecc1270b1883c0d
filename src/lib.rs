//! Supply Watch Library
//!
//! Tracks the share of a token's supply held by a wallet set and alerts the
//! owner when it moves. This library exposes core modules for testing.

pub mod aggregator;
pub mod balance;
pub mod config;
pub mod decimal;
pub mod detector;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod persistence;
pub mod registry;
pub mod retry;
pub mod roles;
pub mod scheduler;
pub mod service;
pub mod sweeper;

// Re-export commonly used types for tests
pub use aggregator::{Aggregation, BalanceAggregator};
pub use balance::{BalanceSource, RpcBalanceSource};
pub use config::AppConfig;
pub use error::{AppError, AppResult, DeliveryError, LookupError, TrackerError, TrackerResult};
pub use metrics::MetricsState;
pub use models::{TrackType, Tracker, TrackerKey, TrackerSpec, TrackerSummary};
pub use notifications::{LogSink, NotificationSink, Notifier, TelegramSink, TrackerEvent};
pub use persistence::{MemorySnapshotStore, PersistenceManager, SnapshotStore, SqliteSnapshotStore};
pub use registry::TrackerRegistry;
pub use retry::RetryPolicy;
pub use roles::{ConfigRoleLookup, Quota, QuotaPolicy, Role, RoleLookup};
pub use scheduler::{PollingScheduler, TickOutcome};
pub use service::{Collaborators, TrackerService};
pub use sweeper::ExpirySweeper;
