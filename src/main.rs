//! Supply Watch - holder concentration alerts for Solana tokens
//!
//! This is the main entry point for the service.
//! It restores the tracker engine and serves the HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use supply_watch::handlers::{self, AppState};
use supply_watch::persistence::open_snapshot_store;
use supply_watch::{
    AppConfig, Collaborators, ConfigRoleLookup, LogSink, MetricsState, NotificationSink,
    RpcBalanceSource, TelegramSink, TrackerService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    tracing::info!("Starting Supply Watch v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = load_config()?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        poll_interval_secs = config.tracker.poll_interval_secs,
        ttl_hours = config.tracker.ttl_hours,
        "Configuration loaded"
    );

    let metrics = Arc::new(MetricsState::new());

    let balances = RpcBalanceSource::new(
        &config.rpc.url,
        std::time::Duration::from_millis(config.rpc.timeout_ms),
    )
    .map_err(|e| anyhow::anyhow!("Failed to create RPC client: {}", e))?;

    let sink: Arc<dyn NotificationSink> = if config.notifications.telegram.enabled {
        let telegram = TelegramSink::new(&config.notifications.telegram, config.tracker.call_timeout())
            .map_err(|e| anyhow::anyhow!("Failed to create Telegram sink: {}", e))?;
        tracing::info!("Telegram notifications enabled");
        Arc::new(telegram)
    } else {
        tracing::warn!("Telegram disabled, notifications will only be logged");
        Arc::new(LogSink)
    };

    let store = open_snapshot_store(&config.persistence).await;

    let service = TrackerService::new(
        &config,
        Collaborators {
            balances: Arc::new(balances),
            roles: Arc::new(ConfigRoleLookup::new(&config.roles)),
            sink,
            store,
        },
        metrics.clone(),
    );

    // Restore before accepting requests
    let report = service.startup().await;
    tracing::info!(
        restored = report.restored.len(),
        expired_offline = report.expired,
        invalid = report.invalid,
        "Tracker state restored"
    );

    let app = handlers::router(Arc::new(AppState::new(service.clone())), metrics);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;

    tracing::info!(%addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.shutdown().await;
    tracing::info!("Supply Watch stopped");

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "supply_watch=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Load and validate configuration
fn load_config() -> anyhow::Result<AppConfig> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

    Ok(config)
}
