//! Configuration management for Supply Watch
//!
//! Loads configuration from YAML/TOML files and environment variables.
//! Environment variables override file values.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Balance-lookup RPC configuration
    #[serde(default)]
    pub rpc: RpcConfig,
    /// Tracker scheduling and lifetime
    #[serde(default)]
    pub tracker: TrackerConfig,
    /// Retry policy for external balance lookups
    #[serde(default)]
    pub retry: RetryConfig,
    /// Snapshot storage
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Owner roles and quotas
    #[serde(default)]
    pub roles: RolesConfig,
    /// Notification configuration
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// RPC endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC endpoint URL
    #[serde(default = "default_rpc_url")]
    pub url: String,
    /// HTTP client timeout in milliseconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_ms: u64,
}

fn default_rpc_url() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}

fn default_rpc_timeout() -> u64 {
    10_000
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            timeout_ms: default_rpc_timeout(),
        }
    }
}

/// Tracker scheduling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Seconds between polls of a single tracker
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Tracker lifetime in hours
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
    /// Seconds between periodic snapshots
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_secs: u64,
    /// Seconds between expiry sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Bound on every external call (lookup, delivery, storage)
    #[serde(default = "default_call_timeout")]
    pub call_timeout_ms: u64,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_ttl_hours() -> i64 {
    48
}

fn default_snapshot_interval() -> u64 {
    30
}

fn default_sweep_interval() -> u64 {
    3600
}

fn default_call_timeout() -> u64 {
    15_000
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            ttl_hours: default_ttl_hours(),
            snapshot_interval_secs: default_snapshot_interval(),
            sweep_interval_secs: default_sweep_interval(),
            call_timeout_ms: default_call_timeout(),
        }
    }
}

impl TrackerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours)
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per lookup, first call included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    /// Cap on a single backoff delay
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Randomize delays slightly
    #[serde(default = "default_true")]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    60_000
}

fn default_true() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            jitter: true,
        }
    }
}

/// Snapshot storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/supply_watch.db")
}

fn default_max_connections() -> u32 {
    2
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Owner role assignments and quotas
#[derive(Debug, Clone, Deserialize)]
pub struct RolesConfig {
    /// Owners with unlimited trackers
    #[serde(default)]
    pub admins: Vec<String>,
    /// Owners with the VIP quota
    #[serde(default)]
    pub vips: Vec<String>,
    /// Tracker limit for VIP owners
    #[serde(default = "default_vip_quota")]
    pub vip_quota: usize,
    /// Tracker limit for everyone else
    #[serde(default = "default_default_quota")]
    pub default_quota: usize,
}

fn default_vip_quota() -> usize {
    10
}

fn default_default_quota() -> usize {
    2
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            admins: Vec::new(),
            vips: Vec::new(),
            vip_quota: default_vip_quota(),
            default_quota: default_default_quota(),
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationsConfig {
    /// Telegram delivery
    #[serde(default)]
    pub telegram: TelegramSettings,
}

/// Telegram bot settings; the tracker destination is used as chat id
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
}

impl AppConfig {
    /// Load configuration from files and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (SUPPLY_WATCH_*)
    /// 2. config/config.{yaml,toml} (if exists)
    /// 3. config.{yaml,toml} (if exists)
    /// 4. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("tracker.poll_interval_secs", 60)?
            .set_default("tracker.ttl_hours", 48)?
            .set_default("tracker.snapshot_interval_secs", 30)?
            .set_default("tracker.sweep_interval_secs", 3600)?
            .set_default("retry.max_attempts", 5)?
            .set_default("retry.initial_delay_ms", 1000)?
            .set_default("persistence.path", "data/supply_watch.db")?
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name("config/config").required(false))
            // SUPPLY_WATCH_TRACKER__POLL_INTERVAL_SECS=30 -> tracker.poll_interval_secs = 30
            // SUPPLY_WATCH_ROLES__ADMINS=alice,bob -> roles.admins = ["alice", "bob"]
            .add_source(
                Environment::with_prefix("SUPPLY_WATCH")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("roles.admins")
                    .with_list_parse_key("roles.vips"),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tracker.poll_interval_secs == 0 {
            return Err(ConfigError::Message(
                "tracker.poll_interval_secs must be greater than zero".to_string(),
            ));
        }

        if self.tracker.snapshot_interval_secs == 0 || self.tracker.sweep_interval_secs == 0 {
            return Err(ConfigError::Message(
                "Snapshot and sweep intervals must be greater than zero".to_string(),
            ));
        }

        if self.tracker.ttl_hours <= 0 {
            return Err(ConfigError::Message(
                "tracker.ttl_hours must be positive".to_string(),
            ));
        }

        if self.tracker.call_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "tracker.call_timeout_ms must be greater than zero".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Message(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.notifications.telegram.enabled && self.notifications.telegram.bot_token.is_empty() {
            return Err(ConfigError::Message(
                "Telegram bot token must be set via SUPPLY_WATCH_NOTIFICATIONS__TELEGRAM__BOT_TOKEN"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            rpc: RpcConfig::default(),
            tracker: TrackerConfig::default(),
            retry: RetryConfig::default(),
            persistence: PersistenceConfig::default(),
            roles: RolesConfig::default(),
            notifications: NotificationsConfig::default(),
        }
    }
}
