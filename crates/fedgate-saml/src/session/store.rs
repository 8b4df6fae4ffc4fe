//! Association store: normalization and purge policy over a pluggable backend
//!
//! Backends differ in one capability: relational and in-memory backends can
//! list every association of a principal, key-value backends can only look
//! up exact keys. Callers check [`AssociationStore::can_enumerate`] before
//! relying on an index-less logout.

use super::types::{
    generate_session_index, identity_hash, normalize_session_index, AssociationKey,
    LogoutAssociation, StoreError,
};
use crate::models::NameId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Probability of a purge after a successful insert.
pub const DEFAULT_PURGE_PROBABILITY: f64 = 0.01;

/// Storage backend for logout associations
#[async_trait]
pub trait AssociationBackend: Send + Sync {
    /// Insert, or refresh only the expiry of an existing key
    async fn upsert(&self, association: &LogoutAssociation) -> Result<(), StoreError>;

    /// Session id for an exact, unexpired key
    async fn lookup(&self, key: &AssociationKey) -> Result<Option<String>, StoreError>;

    /// Every unexpired association of one principal
    ///
    /// Lookup-only backends return [`StoreError::CannotEnumerate`].
    async fn enumerate(
        &self,
        auth_source: &str,
        name_id_hash: &str,
    ) -> Result<Vec<LogoutAssociation>, StoreError>;

    /// Delete one association; absent keys are not an error
    async fn remove(&self, key: &AssociationKey) -> Result<(), StoreError>;

    /// Delete expired associations, returning how many were removed
    async fn purge_expired(&self) -> Result<u64, StoreError>;

    /// Whether [`Self::enumerate`] is supported
    fn can_enumerate(&self) -> bool;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// When expired associations are purged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PurgePolicy {
    /// Purge after an insert with the given probability (0.0 to 1.0)
    Probabilistic { probability: f64 },
    /// Never purge on insert; pair with [`AssociationStore::spawn_periodic_purge`]
    Disabled,
}

impl Default for PurgePolicy {
    fn default() -> Self {
        Self::Probabilistic {
            probability: DEFAULT_PURGE_PROBABILITY,
        }
    }
}

impl PurgePolicy {
    fn should_purge(self) -> bool {
        match self {
            Self::Probabilistic { probability } => rand::random::<f64>() < probability,
            Self::Disabled => false,
        }
    }
}

/// Shared handle over one backend. Cloning shares the backend.
#[derive(Clone)]
pub struct AssociationStore {
    backend: Arc<dyn AssociationBackend>,
    purge_policy: PurgePolicy,
}

impl std::fmt::Debug for AssociationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssociationStore")
            .field("backend", &self.backend.name())
            .field("purge_policy", &self.purge_policy)
            .finish()
    }
}

impl AssociationStore {
    #[must_use]
    pub fn new(backend: Arc<dyn AssociationBackend>) -> Self {
        Self {
            backend,
            purge_policy: PurgePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_purge_policy(mut self, purge_policy: PurgePolicy) -> Self {
        self.purge_policy = purge_policy;
        self
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Record that `session_id` was opened for `name_id` at `auth_id`.
    ///
    /// A missing IdP session index is replaced by a generated one, which is
    /// returned along with any normalized index.
    pub async fn add_session(
        &self,
        auth_id: &str,
        name_id: &NameId,
        session_index: Option<&str>,
        expire_at: DateTime<Utc>,
        session_id: &str,
    ) -> Result<String, StoreError> {
        let raw_index = match session_index {
            Some(index) => index.to_string(),
            None => {
                let generated = generate_session_index();
                tracing::debug!(
                    auth_source = %auth_id,
                    session_index = %generated,
                    "No IdP session index; generated a local one"
                );
                generated
            }
        };
        let key = AssociationKey::new(auth_id, name_id, &raw_index);
        let normalized = key.session_index.clone();

        self.backend
            .upsert(&LogoutAssociation {
                key,
                session_id: session_id.to_string(),
                expires_at: expire_at,
            })
            .await?;

        tracing::debug!(
            auth_source = %auth_id,
            session_index = %normalized,
            expires_at = %expire_at,
            backend = self.backend.name(),
            "Stored logout association"
        );

        if self.backend.can_enumerate() && self.purge_policy.should_purge() {
            if let Err(e) = self.backend.purge_expired().await {
                tracing::warn!(error = %e, "Opportunistic association purge failed");
            }
        }

        Ok(normalized)
    }

    /// Whether `collect_associations` can answer for these indexes.
    #[must_use]
    pub fn can_enumerate(&self, session_indexes: &[String]) -> bool {
        self.backend.can_enumerate() || !session_indexes.is_empty()
    }

    /// Map of normalized session index to session id.
    ///
    /// An empty `session_indexes` means every session of the principal.
    /// Backend failures are logged and yield an empty map so that a logout
    /// never aborts on storage trouble.
    pub async fn collect_associations(
        &self,
        auth_id: &str,
        name_id: &NameId,
        session_indexes: &[String],
    ) -> Result<HashMap<String, String>, StoreError> {
        let name_id_hash = identity_hash(name_id);
        let wanted: HashSet<String> = session_indexes
            .iter()
            .map(|index| normalize_session_index(index))
            .collect();

        if self.backend.can_enumerate() {
            let associations = match self.backend.enumerate(auth_id, &name_id_hash).await {
                Ok(list) => list,
                Err(e) => {
                    tracing::warn!(
                        auth_source = %auth_id,
                        backend = self.backend.name(),
                        error = %e,
                        "Failed to enumerate logout associations"
                    );
                    return Ok(HashMap::new());
                }
            };
            return Ok(associations
                .into_iter()
                .filter(|a| wanted.is_empty() || wanted.contains(&a.key.session_index))
                .map(|a| (a.key.session_index, a.session_id))
                .collect());
        }

        if wanted.is_empty() {
            return Err(StoreError::CannotEnumerate);
        }

        let mut found = HashMap::with_capacity(wanted.len());
        for session_index in wanted {
            let key = AssociationKey {
                auth_source: auth_id.to_string(),
                name_id_hash: name_id_hash.clone(),
                session_index,
            };
            match self.backend.lookup(&key).await {
                Ok(Some(session_id)) => {
                    found.insert(key.session_index, session_id);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        auth_source = %auth_id,
                        backend = self.backend.name(),
                        error = %e,
                        "Failed to look up logout association"
                    );
                    return Ok(HashMap::new());
                }
            }
        }
        Ok(found)
    }

    /// Forget one association.
    pub async fn remove_session(
        &self,
        auth_id: &str,
        name_id: &NameId,
        session_index: &str,
    ) -> Result<(), StoreError> {
        self.backend
            .remove(&AssociationKey::new(auth_id, name_id, session_index))
            .await
    }

    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let purged = self.backend.purge_expired().await?;
        if purged > 0 {
            tracing::debug!(purged, backend = self.backend.name(), "Purged expired associations");
        }
        Ok(purged)
    }

    /// Background sweep for deployments using [`PurgePolicy::Disabled`].
    ///
    /// Abort the returned handle to stop it.
    #[must_use]
    pub fn spawn_periodic_purge(&self, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = store.purge_expired().await {
                    tracing::warn!(error = %e, "Periodic association purge failed");
                }
            }
        })
    }
}
