//! SQLite snapshot store
//!
//! Keeps the latest snapshot in a single-row table. The pool runs in WAL mode
//! so the periodic writer never blocks a concurrent read.

use super::SnapshotStore;
use crate::config::PersistenceConfig;
use crate::error::{TrackerError, TrackerResult};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Type alias for the SQLite connection pool
pub type DbPool = Pool<Sqlite>;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tracker_snapshot (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    payload TEXT NOT NULL,
    saved_at TEXT NOT NULL
)
"#;

fn db_error(context: &str, e: impl std::fmt::Display) -> TrackerError {
    TrackerError::Persistence(format!("{}: {}", context, e))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Move an unreadable database (and its WAL files) out of the way
fn quarantine(path: &Path) -> TrackerResult<PathBuf> {
    let target = with_suffix(path, &format!(".corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S")));
    std::fs::rename(path, &target).map_err(|e| db_error("Failed to move corrupt database aside", e))?;

    for sidecar in ["-wal", "-shm"] {
        let from = with_suffix(path, sidecar);
        if from.exists() {
            if let Err(e) = std::fs::rename(&from, with_suffix(&target, sidecar)) {
                tracing::warn!(path = ?from, error = %e, "Failed to move database sidecar aside");
            }
        }
    }
    Ok(target)
}

/// Snapshot store backed by a SQLite file
pub struct SqliteSnapshotStore {
    pool: DbPool,
}

impl SqliteSnapshotStore {
    /// Open (or create) the database and ensure the schema exists
    pub async fn connect(config: &PersistenceConfig) -> TrackerResult<Self> {
        // Ensure data directory exists
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| db_error("Failed to create database directory", e))?;
                info!("Created database directory: {:?}", parent);
            }
        }

        let db_url = format!("sqlite:{}?mode=rwc", config.path.display());

        let connect_options = SqliteConnectOptions::from_str(&db_url)
            .map_err(|e| db_error("Invalid database path", e))?
            // Enable WAL mode for concurrent reads
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(connect_options)
            .await
            .map_err(|e| db_error("Failed to open database", e))?;

        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(|e| db_error("Failed to create snapshot table", e))?;

        info!(
            "Snapshot store initialized: {:?} (max {} connections)",
            config.path, config.max_connections
        );

        Ok(Self { pool })
    }

    /// Like [`connect`](Self::connect), but an unreadable file is renamed to
    /// `<path>.corrupt-<timestamp>` and a fresh database is created in its place
    pub async fn connect_or_recover(config: &PersistenceConfig) -> TrackerResult<Self> {
        let error = match Self::connect(config).await {
            Ok(store) => match store.read_snapshot().await {
                Ok(_) => return Ok(store),
                Err(e) => {
                    store.pool.close().await;
                    e
                }
            },
            Err(e) => e,
        };

        // Nothing on disk to blame
        if !config.path.is_file() {
            return Err(error);
        }

        let moved = quarantine(&config.path)?;
        tracing::warn!(
            path = ?config.path,
            moved_to = ?moved,
            error = %error,
            "Snapshot database unreadable, starting with a fresh one"
        );
        Self::connect(config).await
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn write_snapshot(&self, bytes: &[u8]) -> TrackerResult<()> {
        let payload = std::str::from_utf8(bytes).map_err(|e| db_error("Snapshot is not UTF-8", e))?;

        sqlx::query(
            r#"
            INSERT INTO tracker_snapshot (id, payload, saved_at)
            VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET payload = excluded.payload, saved_at = excluded.saved_at
            "#,
        )
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to write snapshot", e))?;

        Ok(())
    }

    async fn read_snapshot(&self) -> TrackerResult<Option<Vec<u8>>> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT payload FROM tracker_snapshot WHERE id = 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to read snapshot", e))?;

        Ok(payload.map(String::into_bytes))
    }
}
