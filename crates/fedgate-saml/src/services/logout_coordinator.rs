//! Cross-service logout for local sessions
//!
//! Turns a logout event for a principal into logouts of the local sessions
//! recorded in the association store when that principal's assertions were
//! accepted.

use super::slo_orchestrator::{LogoutDispatcher, LogoutOutcome, LogoutTarget, SloOrchestrator};
use crate::error::{SamlError, SamlResult};
use crate::models::{Assertion, LogoutRequest, NameId};
use crate::session::{AssociationStore, SessionResolver};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

/// Default lifetime of an association when the IdP sets no session expiry.
pub const DEFAULT_SESSION_DURATION_SECONDS: i64 = 8 * 60 * 60;

/// Logs out one local session at an auth source.
///
/// Unknown or already ended sessions count as done.
pub struct LocalSessionDispatcher {
    resolver: Arc<dyn SessionResolver>,
}

impl LocalSessionDispatcher {
    #[must_use]
    pub fn new(resolver: Arc<dyn SessionResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl LogoutDispatcher<String> for LocalSessionDispatcher {
    async fn dispatch(&self, session_id: &str, auth_id: String) -> SamlResult<()> {
        let Some(session) = self.resolver.resolve(session_id).await else {
            tracing::debug!(session_id = %session_id, "Session already gone");
            return Ok(());
        };
        if !session.is_valid(&auth_id).await {
            tracing::debug!(session_id = %session_id, auth_source = %auth_id, "Session no longer authenticated");
            return Ok(());
        }
        session.do_logout(&auth_id).await
    }
}

/// Logout coordination over an association store and a session resolver.
#[derive(Clone)]
pub struct LogoutCoordinator {
    store: AssociationStore,
    resolver: Arc<dyn SessionResolver>,
    session_duration: ChronoDuration,
}

impl LogoutCoordinator {
    #[must_use]
    pub fn new(store: AssociationStore, resolver: Arc<dyn SessionResolver>) -> Self {
        Self {
            store,
            resolver,
            session_duration: ChronoDuration::seconds(DEFAULT_SESSION_DURATION_SECONDS),
        }
    }

    #[must_use]
    pub fn with_session_duration(mut self, session_duration: ChronoDuration) -> Self {
        self.session_duration = session_duration;
        self
    }

    #[must_use]
    pub fn store(&self) -> &AssociationStore {
        &self.store
    }

    /// Log out every live session associated with `name_id` at `auth_id`.
    ///
    /// Returns how many sessions were logged out. Sessions that no longer
    /// resolve or are no longer authenticated at `auth_id` are skipped.
    /// If any `do_logout` fails the run still continues, then reports
    /// [`SamlError::PartialLogoutFailure`] keyed by session id.
    /// A key-value backend without `session_indexes` yields
    /// [`SamlError::StoreUnavailable`] so the caller can fall back.
    pub async fn logout_sessions(
        &self,
        auth_id: &str,
        name_id: &NameId,
        session_indexes: &[String],
    ) -> SamlResult<usize> {
        let associations = self
            .store
            .collect_associations(auth_id, name_id, session_indexes)
            .await?;

        let mut completed = BTreeSet::new();
        let mut failed = BTreeMap::new();
        for (session_index, session_id) in associations {
            let Some(session) = self.resolver.resolve(&session_id).await else {
                tracing::debug!(session_index = %session_index, "Associated session no longer exists");
                continue;
            };
            if !session.is_valid(auth_id).await {
                tracing::debug!(
                    session_index = %session_index,
                    auth_source = %auth_id,
                    "Associated session not authenticated at this source"
                );
                continue;
            }
            match session.do_logout(auth_id).await {
                Ok(()) => {
                    completed.insert(session_id);
                }
                Err(e) => {
                    tracing::warn!(
                        session_index = %session_index,
                        auth_source = %auth_id,
                        error = %e,
                        "Session logout failed"
                    );
                    failed.insert(session_id, e.to_string());
                }
            }
        }

        tracing::info!(
            auth_source = %auth_id,
            logged_out = completed.len(),
            failed = failed.len(),
            "Logout of associated sessions finished"
        );
        if failed.is_empty() {
            Ok(completed.len())
        } else {
            Err(SamlError::PartialLogoutFailure {
                completed,
                failed,
                timed_out: BTreeSet::new(),
            })
        }
    }

    /// Record the association for a freshly validated assertion.
    ///
    /// Never fails the login: store errors are logged and `None` returned.
    pub async fn record_login(
        &self,
        auth_id: &str,
        assertion: &Assertion,
        session_id: &str,
    ) -> Option<String> {
        let expire_at = assertion
            .session_not_on_or_after
            .unwrap_or_else(|| Utc::now() + self.session_duration);

        match self
            .store
            .add_session(
                auth_id,
                &assertion.name_id,
                assertion.session_index.as_deref(),
                expire_at,
                session_id,
            )
            .await
        {
            Ok(session_index) => Some(session_index),
            Err(e) => {
                tracing::warn!(
                    auth_source = %auth_id,
                    assertion_id = %assertion.id,
                    error = %e,
                    "Failed to record logout association"
                );
                None
            }
        }
    }

    /// Apply a validated inbound LogoutRequest.
    pub async fn handle_logout_request(
        &self,
        auth_id: &str,
        request: &LogoutRequest,
    ) -> SamlResult<usize> {
        tracing::info!(
            request_id = %request.id,
            issuer = %request.issuer,
            session_indexes = request.session_indexes.len(),
            "Processing LogoutRequest"
        );
        self.logout_sessions(auth_id, &request.name_id, &request.session_indexes)
            .await
    }

    /// Concurrent variant of [`Self::logout_sessions`] with a per-session
    /// deadline, reporting the fate of every session id.
    pub async fn fan_out_local(
        &self,
        auth_id: &str,
        name_id: &NameId,
        session_indexes: &[String],
        timeout: Duration,
    ) -> SamlResult<LogoutOutcome> {
        let associations = self
            .store
            .collect_associations(auth_id, name_id, session_indexes)
            .await?;

        let targets = associations
            .into_values()
            .map(|session_id| LogoutTarget::new(session_id, timeout, auth_id.to_string()))
            .collect();

        let orchestrator =
            SloOrchestrator::new(Arc::new(LocalSessionDispatcher::new(Arc::clone(&self.resolver))));
        Ok(orchestrator.run(targets).await)
    }
}
