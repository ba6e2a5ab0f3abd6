//! SQLite connection pool factory and migration runner.
//!
//! Every connection enforces foreign keys; file databases run in WAL mode.
//! Module migrations are applied at most once each, tracked by
//! `(module, id)` in the `_migrations` table.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use bookstore_kernel::settings::DatabaseSettings;
use bookstore_kernel::Migration;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Sqlite, Transaction};

const MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        module     TEXT NOT NULL,
        id         TEXT NOT NULL,
        applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (module, id)
    )
"#;

/// Handle to the relational store; cheap to clone.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a pool for the configured database URL.
    pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(&settings.url)
            .with_context(|| format!("invalid database url '{}'", settings.url))?
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(30));

        let (options, pool_options) = if settings.is_in_memory() {
            // Each new connection to `:memory:` would see an empty database.
            (
                options,
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None),
            )
        } else {
            (
                options
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal),
                SqlitePoolOptions::new().max_connections(settings.max_connections),
            )
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open database '{}'", settings.url))?;

        tracing::info!(target: "bookstore-db", url = %settings.url, "database pool ready");

        Ok(Self { pool })
    }

    /// Private in-memory database, used by tests and throwaway runs.
    pub async fn in_memory() -> anyhow::Result<Self> {
        Self::connect(&DatabaseSettings {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open a read transaction; dropping it without `commit` rolls back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Open a transaction that holds the write lock from its first statement.
    ///
    /// A deferred transaction that reads before writing cannot wait out a
    /// concurrent writer in WAL mode and fails with `SQLITE_BUSY`. `BEGIN
    /// IMMEDIATE` queues on the busy timeout instead.
    pub async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin_with("BEGIN IMMEDIATE").await
    }

    /// Apply pending migrations in the given order and return how many ran.
    ///
    /// Each migration runs in its own transaction together with its
    /// bookkeeping row, so a failing script leaves no trace.
    pub async fn migrate(&self, migrations: &[(String, Migration)]) -> anyhow::Result<usize> {
        sqlx::raw_sql(MIGRATIONS_TABLE)
            .execute(&self.pool)
            .await
            .context("failed to create migrations table")?;

        let mut applied = 0;
        for (module, migration) in migrations {
            let mut tx = self.pool.begin().await?;

            let seen: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM _migrations WHERE module = ? AND id = ?")
                    .bind(module.as_str())
                    .bind(migration.id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if seen.is_some() {
                tracing::debug!(
                    target: "bookstore-db",
                    %module,
                    migration = migration.id,
                    "migration already applied"
                );
                continue;
            }

            sqlx::raw_sql(migration.up)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("migration {}/{} failed", module, migration.id))?;
            sqlx::query("INSERT INTO _migrations (module, id) VALUES (?, ?)")
                .bind(module.as_str())
                .bind(migration.id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            tracing::info!(
                target: "bookstore-db",
                %module,
                migration = migration.id,
                "migration applied"
            );
            applied += 1;
        }

        Ok(applied)
    }

    /// `(module, id)` pairs already applied, oldest first.
    pub async fn applied_migrations(&self) -> anyhow::Result<Vec<(String, String)>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT module, id FROM _migrations ORDER BY applied_at, module, id",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to read migrations table")?;
        Ok(rows)
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
