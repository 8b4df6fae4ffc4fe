//! Gateway configuration loaded from environment variables.
//!
//! Loading is fail-fast: a variable that is present but invalid is an
//! error, never silently replaced by its default.

use crate::services::{LogoutCoordinator, TrustValidator};
use crate::session::{
    AssociationStore, InMemoryAssociationBackend, KeyValueAssociationBackend, MokaKvClient,
    PostgresAssociationBackend, PurgePolicy, RedisKvClient, SessionResolver,
    DEFAULT_PURGE_PROBABILITY,
};
use fedgate_db::{run_migrations, DbPool};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default association lifetime when the IdP sends no session expiry (8 h).
pub const DEFAULT_SESSION_DURATION_SECS: u64 = 28_800;
/// Default per-target logout deadline.
pub const DEFAULT_LOGOUT_TIMEOUT_SECS: u64 = 10;
/// Default clock skew tolerance.
pub const DEFAULT_CLOCK_SKEW_SECS: u64 = 60;
/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info,fedgate_saml=debug";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("Association backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// Which association backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Relational, enumerable
    Postgres,
    /// Networked key-value, lookup only
    Redis,
    /// In-process key-value with TTL, lookup only
    Moka,
    /// In-process map, enumerable
    Memory,
}

impl StoreKind {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_lowercase().as_str() {
            "postgres" | "postgresql" | "sql" => Ok(Self::Postgres),
            "redis" => Ok(Self::Redis),
            "moka" => Ok(Self::Moka),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidValue {
                var: "FEDGATE_STORE".to_string(),
                message: format!("unknown store '{other}' (postgres, redis, moka, memory)"),
            }),
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub store: StoreKind,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub purge_policy: PurgePolicy,
    pub session_duration: Duration,
    pub logout_timeout: Duration,
    pub clock_skew: Duration,
    pub log_filter: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            store: StoreKind::Memory,
            database_url: None,
            redis_url: None,
            purge_policy: PurgePolicy::default(),
            session_duration: Duration::from_secs(DEFAULT_SESSION_DURATION_SECS),
            logout_timeout: Duration::from_secs(DEFAULT_LOGOUT_TIMEOUT_SECS),
            clock_skew: Duration::from_secs(DEFAULT_CLOCK_SKEW_SECS),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl GatewayConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok().filter(|v| !v.is_empty()))
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = match lookup("FEDGATE_STORE") {
            Some(value) => StoreKind::parse(&value)?,
            None => StoreKind::Memory,
        };

        let database_url = lookup("DATABASE_URL");
        let redis_url = lookup("REDIS_URL");
        match store {
            StoreKind::Postgres if database_url.is_none() => {
                return Err(ConfigError::MissingVar("DATABASE_URL".to_string()))
            }
            StoreKind::Redis if redis_url.is_none() => {
                return Err(ConfigError::MissingVar("REDIS_URL".to_string()))
            }
            _ => {}
        }

        let probability = match lookup("FEDGATE_PURGE_PROBABILITY") {
            Some(value) => parse_probability(&value)?,
            None => DEFAULT_PURGE_PROBABILITY,
        };
        let purge_policy = if probability > 0.0 {
            PurgePolicy::Probabilistic { probability }
        } else {
            PurgePolicy::Disabled
        };

        Ok(Self {
            store,
            database_url,
            redis_url,
            purge_policy,
            session_duration: seconds(
                &lookup,
                "FEDGATE_SESSION_DURATION_SECS",
                DEFAULT_SESSION_DURATION_SECS,
            )?,
            logout_timeout: seconds(
                &lookup,
                "FEDGATE_LOGOUT_TIMEOUT_SECS",
                DEFAULT_LOGOUT_TIMEOUT_SECS,
            )?,
            clock_skew: seconds(&lookup, "FEDGATE_CLOCK_SKEW_SECS", DEFAULT_CLOCK_SKEW_SECS)?,
            log_filter: lookup("FEDGATE_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }

    /// Connect the configured backend and wrap it in a store.
    ///
    /// The PostgreSQL backend runs pending migrations first.
    pub async fn build_association_store(&self) -> Result<AssociationStore, ConfigError> {
        let store = match self.store {
            StoreKind::Postgres => {
                let url = self
                    .database_url
                    .as_deref()
                    .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;
                let pool = DbPool::connect(url)
                    .await
                    .map_err(|e| ConfigError::BackendUnavailable(e.to_string()))?;
                run_migrations(&pool)
                    .await
                    .map_err(|e| ConfigError::BackendUnavailable(e.to_string()))?;
                AssociationStore::new(Arc::new(PostgresAssociationBackend::from_db_pool(&pool)))
            }
            StoreKind::Redis => {
                let url = self
                    .redis_url
                    .as_deref()
                    .ok_or_else(|| ConfigError::MissingVar("REDIS_URL".to_string()))?;
                let client = RedisKvClient::connect(url)
                    .await
                    .map_err(|e| ConfigError::BackendUnavailable(e.to_string()))?;
                AssociationStore::new(Arc::new(KeyValueAssociationBackend::new(client)))
            }
            StoreKind::Moka => {
                AssociationStore::new(Arc::new(KeyValueAssociationBackend::new(MokaKvClient::new())))
            }
            StoreKind::Memory => AssociationStore::new(Arc::new(InMemoryAssociationBackend::new())),
        };

        tracing::info!(
            backend = store.backend_name(),
            purge_policy = ?self.purge_policy,
            "Association store ready"
        );
        Ok(store.with_purge_policy(self.purge_policy))
    }

    /// Trust validator with the configured clock skew.
    #[must_use]
    pub fn trust_validator(&self) -> TrustValidator {
        TrustValidator::new().with_clock_skew(to_chrono(self.clock_skew))
    }

    /// Coordinator over `store` with the configured session duration.
    #[must_use]
    pub fn logout_coordinator(
        &self,
        store: AssociationStore,
        resolver: Arc<dyn SessionResolver>,
    ) -> LogoutCoordinator {
        LogoutCoordinator::new(store, resolver).with_session_duration(to_chrono(self.session_duration))
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

fn parse_probability(value: &str) -> Result<f64, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidValue {
        var: "FEDGATE_PURGE_PROBABILITY".to_string(),
        message,
    };
    let probability: f64 = value
        .trim()
        .parse()
        .map_err(|e| invalid(format!("{e}")))?;
    if (0.0..=1.0).contains(&probability) {
        Ok(probability)
    } else {
        Err(invalid(format!("{probability} is outside 0.0..=1.0")))
    }
}

fn seconds<F>(lookup: &F, var: &str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(var) else {
        return Ok(Duration::from_secs(default));
    };
    let secs: u64 = value.trim().parse().map_err(|e| ConfigError::InvalidValue {
        var: var.to_string(),
        message: format!("{e}"),
    })?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue {
            var: var.to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
