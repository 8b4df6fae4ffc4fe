//! In-memory association backend for tests and single-node deployments

use super::store::AssociationBackend;
use super::types::{AssociationKey, LogoutAssociation, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Enumerable backend held in a `HashMap`.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAssociationBackend {
    associations: Arc<RwLock<HashMap<AssociationKey, LogoutAssociation>>>,
}

impl InMemoryAssociationBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.associations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.associations.read().await.is_empty()
    }
}

#[async_trait]
impl AssociationBackend for InMemoryAssociationBackend {
    async fn upsert(&self, association: &LogoutAssociation) -> Result<(), StoreError> {
        let mut associations = self.associations.write().await;
        associations
            .entry(association.key.clone())
            .and_modify(|existing| existing.expires_at = association.expires_at)
            .or_insert_with(|| association.clone());
        Ok(())
    }

    async fn lookup(&self, key: &AssociationKey) -> Result<Option<String>, StoreError> {
        let now = Utc::now();
        let associations = self.associations.read().await;
        Ok(associations
            .get(key)
            .filter(|a| !a.is_expired_at(now))
            .map(|a| a.session_id.clone()))
    }

    async fn enumerate(
        &self,
        auth_source: &str,
        name_id_hash: &str,
    ) -> Result<Vec<LogoutAssociation>, StoreError> {
        let now = Utc::now();
        let associations = self.associations.read().await;
        Ok(associations
            .values()
            .filter(|a| {
                a.key.auth_source == auth_source
                    && a.key.name_id_hash == name_id_hash
                    && !a.is_expired_at(now)
            })
            .cloned()
            .collect())
    }

    async fn remove(&self, key: &AssociationKey) -> Result<(), StoreError> {
        self.associations.write().await.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut associations = self.associations.write().await;
        let before = associations.len();
        associations.retain(|_, a| !a.is_expired_at(now));
        Ok((before - associations.len()) as u64)
    }

    fn can_enumerate(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
