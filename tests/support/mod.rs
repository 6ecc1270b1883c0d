//! Shared fakes for the collaborator traits

#![allow(dead_code)]

use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use supply_watch::{
    AppConfig, BalanceSource, Collaborators, DeliveryError, LookupError, MemorySnapshotStore,
    MetricsState, NotificationSink, Role, RoleLookup, SnapshotStore, TrackType, TrackerService,
    TrackerSpec,
};

pub fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Balances keyed by wallet; unknown wallets hold zero
#[derive(Default)]
pub struct ScriptedBalances {
    balances: Mutex<HashMap<String, u64>>,
    failing: Mutex<Vec<String>>,
    pub calls: AtomicU32,
}

impl ScriptedBalances {
    pub fn set(&self, wallet: &str, raw: u64) {
        self.balances.lock().insert(wallet.to_string(), raw);
    }

    pub fn fail(&self, wallet: &str) {
        self.failing.lock().push(wallet.to_string());
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BalanceSource for ScriptedBalances {
    async fn get_balance(&self, wallet: &str, _token: &str) -> Result<u64, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().iter().any(|w| w == wallet) {
            return Err(LookupError::RateLimited);
        }
        Ok(self.balances.lock().get(wallet).copied().unwrap_or(0))
    }
}

/// Records every delivered message
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait::async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, destination: &str, text: &str) -> Result<(), DeliveryError> {
        self.sent.lock().push((destination.to_string(), text.to_string()));
        Ok(())
    }
}

/// Fixed role table
#[derive(Default)]
pub struct StaticRoles {
    roles: HashMap<String, Role>,
}

impl StaticRoles {
    pub fn with(mut self, owner: &str, role: Role) -> Self {
        self.roles.insert(owner.to_string(), role);
        self
    }
}

#[async_trait::async_trait]
impl RoleLookup for StaticRoles {
    async fn role(&self, owner: &str) -> anyhow::Result<Role> {
        Ok(self.roles.get(owner).copied().unwrap_or(Role::Default))
    }
}

/// Role backend that is always down
pub struct BrokenRoles;

#[async_trait::async_trait]
impl RoleLookup for BrokenRoles {
    async fn role(&self, _owner: &str) -> anyhow::Result<Role> {
        anyhow::bail!("role service unavailable")
    }
}

pub struct TestEngine {
    pub service: Arc<TrackerService>,
    pub balances: Arc<ScriptedBalances>,
    pub sink: Arc<RecordingSink>,
    pub metrics: Arc<MetricsState>,
}

pub fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.retry.jitter = false;
    config.retry.max_attempts = 2;
    config
}

pub fn engine_with(roles: Arc<dyn RoleLookup>, store: Arc<dyn SnapshotStore>) -> TestEngine {
    let balances = Arc::new(ScriptedBalances::default());
    let sink = Arc::new(RecordingSink::default());
    let metrics = Arc::new(MetricsState::new());
    let service = TrackerService::new(
        &config(),
        Collaborators {
            balances: balances.clone(),
            roles,
            sink: sink.clone(),
            store,
        },
        metrics.clone(),
    );
    TestEngine {
        service,
        balances,
        sink,
        metrics,
    }
}

pub fn engine() -> TestEngine {
    engine_with(
        Arc::new(StaticRoles::default()),
        Arc::new(MemorySnapshotStore::new()),
    )
}

/// Two wallets, 9 decimals, supply 1000, baseline 10%, threshold 1
pub fn spec(token: &str, track_type: TrackType) -> TrackerSpec {
    TrackerSpec {
        destination: format!("chat-{}", token),
        token_address: token.to_string(),
        wallets: vec!["W1".to_string(), "W2".to_string()],
        track_type,
        total_supply: d("1000"),
        decimals: 9,
        ticker: token.to_uppercase(),
        initial_percentage: d("10"),
        threshold: d("1"),
    }
}
