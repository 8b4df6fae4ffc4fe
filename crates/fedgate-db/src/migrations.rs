//! Schema migrations for the association store
//!
//! The SQL files under `migrations/` are embedded in the binary, so a
//! deployment needs no migration files on disk.

use crate::error::DbError;
use crate::pool::DbPool;
use sqlx::migrate::Migrator;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Bring the schema up to date. Already applied versions are skipped.
///
/// ```rust,ignore
/// let pool = DbPool::connect("postgres://localhost/fedgate").await?;
/// fedgate_db::run_migrations(&pool).await?;
/// ```
///
/// # Errors
///
/// `DbError::MigrationFailed` when a version fails to apply or an applied
/// version no longer matches its embedded checksum.
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    let latest = latest_version();
    tracing::info!(latest_version = ?latest, "Applying association store migrations");

    MIGRATOR
        .run(pool.inner())
        .await
        .map_err(DbError::MigrationFailed)?;

    tracing::info!(latest_version = ?latest, "Association store schema is current");
    Ok(())
}

/// Highest embedded migration version, if any.
#[must_use]
pub fn latest_version() -> Option<i64> {
    MIGRATOR.iter().map(|m| m.version).max()
}
