//! Database connection pool.

use crate::error::DbError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Connection pool for the ledger database.
///
/// Thin wrapper over [`sqlx::PgPool`] so callers configure connections in one
/// place; model functions take the inner pool directly.
#[derive(Debug, Clone)]
pub struct DbPool {
    pool: PgPool,
}

impl DbPool {
    /// Connect with default pool settings.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        Self::connect_with(database_url, 10).await
    }

    /// Connect with an explicit connection cap.
    pub async fn connect_with(database_url: &str, max_connections: u32) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await
            .map_err(DbError::ConnectionFailed)?;

        tracing::info!(max_connections, "connected to ledger database");
        Ok(Self { pool })
    }

    /// The underlying sqlx pool.
    #[must_use]
    pub fn inner(&self) -> &PgPool {
        &self.pool
    }

    /// Begin a transaction on the pool.
    pub async fn begin(&self) -> Result<sqlx::Transaction<'_, sqlx::Postgres>, DbError> {
        self.pool.begin().await.map_err(DbError::from)
    }

    /// Close all connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl From<PgPool> for DbPool {
    fn from(pool: PgPool) -> Self {
        Self { pool }
    }
}
