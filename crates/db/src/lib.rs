//! SQLite access layer: pool construction and module-contributed migrations.

use std::str::FromStr;
use std::time::Duration;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const MAX_CONNECTIONS: u32 = 8;
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// A schema migration contributed by a module.
///
/// Executed at most once per database; `id` must be unique within the module.
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

/// Errors surfaced by the database layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("failed to format migration timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// Handle to the SQLite database shared by all modules.
#[derive(Clone, Debug)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Opens the database at the configured URL, creating the file if missing.
    ///
    /// WAL mode so readers do not block the writer; busy timeout instead of
    /// immediate SQLITE_BUSY under write contention.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;

        tracing::info!(url, "database opened");

        Ok(Self { pool })
    }

    /// Wraps an existing pool. Used by tests running on `sqlite::memory:`.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Applies unapplied migrations in order.
    ///
    /// Each applied migration is recorded in `schema_migrations` keyed by
    /// `(module, id)`, so re-running at every startup is safe.
    pub async fn run_migrations(&self, migrations: &[(String, Migration)]) -> Result<(), DbError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                module TEXT NOT NULL,
                id TEXT NOT NULL,
                applied_at TEXT NOT NULL,
                PRIMARY KEY (module, id)
            )",
        )
        .execute(&self.pool)
        .await?;

        for (module, migration) in migrations {
            let applied: Option<(String,)> =
                sqlx::query_as("SELECT id FROM schema_migrations WHERE module = ? AND id = ?")
                    .bind(module)
                    .bind(migration.id)
                    .fetch_optional(&self.pool)
                    .await?;

            if applied.is_some() {
                tracing::debug!(module, id = migration.id, "migration already applied");
                continue;
            }

            sqlx::raw_sql(migration.up).execute(&self.pool).await?;

            sqlx::query("INSERT INTO schema_migrations (module, id, applied_at) VALUES (?, ?, ?)")
                .bind(module)
                .bind(migration.id)
                .bind(OffsetDateTime::now_utc().format(&Rfc3339)?)
                .execute(&self.pool)
                .await?;

            tracing::info!(module, id = migration.id, "migration applied");
        }

        Ok(())
    }
}
