//! Local session handles
//!
//! The gateway's session storage lives outside this crate. Logout only
//! needs to turn a session id into a handle, ask whether it is still
//! authenticated at an auth source, and log it out there.

use crate::error::SamlResult;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A local user session.
#[async_trait]
pub trait Session: Send + Sync {
    fn session_id(&self) -> &str;

    /// Still authenticated at `auth_id`?
    async fn is_valid(&self, auth_id: &str) -> bool;

    /// End the authentication at `auth_id`.
    async fn do_logout(&self, auth_id: &str) -> SamlResult<()>;
}

/// Resolves a session id to a live session.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, session_id: &str) -> Option<Arc<dyn Session>>;
}

/// Session authenticated at a set of auth sources.
#[derive(Debug)]
pub struct LocalSession {
    id: String,
    auth_sources: RwLock<HashSet<String>>,
}

impl LocalSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            auth_sources: RwLock::new(HashSet::new()),
        }
    }

    pub async fn authenticate(&self, auth_id: &str) {
        self.auth_sources.write().await.insert(auth_id.to_string());
    }
}

#[async_trait]
impl Session for LocalSession {
    fn session_id(&self) -> &str {
        &self.id
    }

    async fn is_valid(&self, auth_id: &str) -> bool {
        self.auth_sources.read().await.contains(auth_id)
    }

    async fn do_logout(&self, auth_id: &str) -> SamlResult<()> {
        self.auth_sources.write().await.remove(auth_id);
        tracing::info!(session_id = %self.id, auth_source = %auth_id, "Session logged out");
        Ok(())
    }
}

/// In-process registry of sessions, for single-node deployments and tests.
#[derive(Default, Clone)]
pub struct InMemorySessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<dyn Session>>>>,
}

impl InMemorySessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, session: Arc<dyn Session>) {
        self.sessions
            .write()
            .await
            .insert(session.session_id().to_string(), session);
    }

    pub async fn unregister(&self, session_id: &str) -> Option<Arc<dyn Session>> {
        self.sessions.write().await.remove(session_id)
    }
}

#[async_trait]
impl SessionResolver for InMemorySessionRegistry {
    async fn resolve(&self, session_id: &str) -> Option<Arc<dyn Session>> {
        self.sessions.read().await.get(session_id).cloned()
    }
}
