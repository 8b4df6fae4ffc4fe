//! Connection pool wrapper.

use crate::error::DbError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Pool sizing and timeouts.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Maximum number of open connections.
    pub max_connections: u32,
    /// How long `acquire` waits before giving up.
    pub acquire_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// PostgreSQL connection pool shared by every store operation.
///
/// Cloning is cheap; all clones share the same underlying pool, which is
/// safe for concurrent use by parallel logout operations.
#[derive(Debug, Clone)]
pub struct DbPool {
    inner: PgPool,
}

impl DbPool {
    /// Connect with default pool options.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        Self::connect_with(url, &PoolOptions::default()).await
    }

    /// Connect with explicit pool options.
    pub async fn connect_with(url: &str, options: &PoolOptions) -> Result<Self, DbError> {
        let inner = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect(url)
            .await
            .map_err(DbError::ConnectionFailed)?;

        tracing::info!(
            max_connections = options.max_connections,
            "Database pool established"
        );

        Ok(Self { inner })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(inner: PgPool) -> Self {
        Self { inner }
    }

    /// Borrow the underlying `sqlx` pool.
    #[must_use]
    pub fn inner(&self) -> &PgPool {
        &self.inner
    }
}
