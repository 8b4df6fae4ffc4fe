//! PostgreSQL association backend
//!
//! Uses the `saml_logout_associations` table created by the fedgate-db
//! migrations. Concurrent inserts of the same key are resolved by
//! `ON CONFLICT`.

use super::store::AssociationBackend;
use super::types::{AssociationKey, LogoutAssociation, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use fedgate_db::DbPool;
use sqlx::{PgPool, Row};

/// Enumerable relational backend.
#[derive(Debug, Clone)]
pub struct PostgresAssociationBackend {
    pool: PgPool,
}

impl PostgresAssociationBackend {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn from_db_pool(pool: &DbPool) -> Self {
        Self::new(pool.inner().clone())
    }
}

fn storage_error(context: &str) -> impl Fn(sqlx::Error) -> StoreError + '_ {
    move |e| StoreError::StorageError(format!("{context}: {e}"))
}

#[async_trait]
impl AssociationBackend for PostgresAssociationBackend {
    async fn upsert(&self, association: &LogoutAssociation) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO saml_logout_associations
                (auth_source, name_id_hash, session_index, session_id, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (auth_source, name_id_hash, session_index) DO UPDATE
            SET expires_at = EXCLUDED.expires_at
            ",
        )
        .bind(&association.key.auth_source)
        .bind(&association.key.name_id_hash)
        .bind(&association.key.session_index)
        .bind(&association.session_id)
        .bind(association.expires_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error("Failed to store logout association"))?;

        Ok(())
    }

    async fn lookup(&self, key: &AssociationKey) -> Result<Option<String>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT session_id
            FROM saml_logout_associations
            WHERE auth_source = $1
              AND name_id_hash = $2
              AND session_index = $3
              AND expires_at > $4
            ",
        )
        .bind(&key.auth_source)
        .bind(&key.name_id_hash)
        .bind(&key.session_index)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error("Failed to look up logout association"))?;

        Ok(row.map(|r| r.get("session_id")))
    }

    async fn enumerate(
        &self,
        auth_source: &str,
        name_id_hash: &str,
    ) -> Result<Vec<LogoutAssociation>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT auth_source, name_id_hash, session_index, session_id, expires_at
            FROM saml_logout_associations
            WHERE auth_source = $1
              AND name_id_hash = $2
              AND expires_at > $3
            ",
        )
        .bind(auth_source)
        .bind(name_id_hash)
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("Failed to enumerate logout associations"))?;

        Ok(rows
            .into_iter()
            .map(|r| LogoutAssociation {
                key: AssociationKey {
                    auth_source: r.get("auth_source"),
                    name_id_hash: r.get("name_id_hash"),
                    session_index: r.get("session_index"),
                },
                session_id: r.get("session_id"),
                expires_at: r.get("expires_at"),
            })
            .collect())
    }

    async fn remove(&self, key: &AssociationKey) -> Result<(), StoreError> {
        sqlx::query(
            r"
            DELETE FROM saml_logout_associations
            WHERE auth_source = $1 AND name_id_hash = $2 AND session_index = $3
            ",
        )
        .bind(&key.auth_source)
        .bind(&key.name_id_hash)
        .bind(&key.session_index)
        .execute(&self.pool)
        .await
        .map_err(storage_error("Failed to remove logout association"))?;

        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM saml_logout_associations WHERE expires_at <= $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(storage_error("Failed to purge logout associations"))?;

        Ok(result.rows_affected())
    }

    fn can_enumerate(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
