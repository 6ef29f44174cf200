//! PostgreSQL-backed secret store.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::crypto::KeyMinter;
use crate::store::{SecretRecord, SecretStore, StoreError};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS secrets (
    key TEXT PRIMARY KEY,
    secret TEXT,
    retrieved_at TIMESTAMPTZ NULL
)";

/// Secret store on a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PostgresSecretStore {
    pool: PgPool,
    minter: KeyMinter,
    op_timeout: Duration,
}

impl PostgresSecretStore {
    /// Connects using the service database configuration and ensures the schema.
    pub async fn connect(config: &DatabaseConfig, minter: KeyMinter) -> Result<Self, StoreError> {
        info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            ssl_mode = ?config.ssl_mode,
            "Connecting to PostgreSQL"
        );
        Self::connect_with(
            config.connect_options(),
            config.max_connections,
            config.timeout(),
            minter,
        )
        .await
    }

    /// Connects with explicit options.
    ///
    /// `op_timeout` bounds pool acquisition and every store operation.
    pub async fn connect_with(
        opts: PgConnectOptions,
        max_connections: u32,
        op_timeout: Duration,
        minter: KeyMinter,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(op_timeout)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            minter,
            op_timeout,
        };
        store.migrate().await?;

        Ok(store)
    }

    /// Creates the `secrets` table when missing.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        self.bounded(async {
            sqlx::query(SCHEMA).execute(&self.pool).await?;
            Ok(())
        })
        .await
    }

    /// Loads a record without consuming it.
    pub async fn record(&self, key: &str) -> Result<Option<SecretRecord>, StoreError> {
        self.bounded(async {
            let record = sqlx::query_as::<_, SecretRecord>(
                "SELECT key, secret, retrieved_at FROM secrets WHERE key = $1",
            )
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
            Ok(record)
        })
        .await
    }

    /// Runs `op` under the store operation timeout.
    ///
    /// A transaction still open when the deadline fires is dropped and
    /// therefore rolled back.
    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.op_timeout, op)
            .await
            .map_err(|_| StoreError::Timeout(self.op_timeout))?
    }

    async fn insert(&self, key: &str, payload: &str) -> Result<(), StoreError> {
        let result = sqlx::query("INSERT INTO secrets (key, secret, retrieved_at) VALUES ($1, $2, NULL)")
            .bind(key)
            .bind(payload)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(ref db_err)) if db_err.code().as_deref() == Some("23505") => {
                Err(StoreError::KeyCollision)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SecretStore for PostgresSecretStore {
    async fn put(&self, payload: &str) -> Result<String, StoreError> {
        if payload.is_empty() {
            return Err(StoreError::EmptyPayload);
        }

        let key = self.minter.mint()?;
        self.bounded(self.insert(&key, payload)).await?;

        debug!(key_len = key.len(), "Stored secret");
        Ok(key)
    }

    async fn take_once(&self, key: &str) -> Result<String, StoreError> {
        self.bounded(async {
            // Row lock serializes concurrent readers; the loser sees the tombstone.
            let mut tx = self.pool.begin().await?;

            let record = sqlx::query_as::<_, SecretRecord>(
                "SELECT key, secret, retrieved_at FROM secrets WHERE key = $1 FOR UPDATE",
            )
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(mut record) = record else {
                return Err(StoreError::NotFound);
            };

            let payload = record.consume(Utc::now())?;

            let result = sqlx::query("UPDATE secrets SET secret = '', retrieved_at = $1 WHERE key = $2")
                .bind(record.retrieved_at)
                .bind(key)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() != 1 {
                warn!(rows = result.rows_affected(), "Tombstone update touched unexpected rows");
                return Err(StoreError::AlreadyConsumed);
            }

            tx.commit().await?;
            Ok(payload)
        })
        .await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.bounded(async {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok(())
        })
        .await
    }
}
