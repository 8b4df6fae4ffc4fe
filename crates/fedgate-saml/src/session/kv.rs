//! Key-value association backend
//!
//! Each association is one key, `saml.logout:{auth}:{hash}:{index}`, whose
//! value is the session id and whose TTL is the association's remaining
//! lifetime. Expiry is left to the store, so there is nothing to purge and
//! nothing to enumerate.

use super::store::AssociationBackend;
use super::types::{AssociationKey, LogoutAssociation, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use moka::future::Cache;
use moka::ops::compute::Op;
use moka::Expiry;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::{Duration, Instant};

/// Maximum number of entries held by [`MokaKvClient`].
const MAX_CACHE_ENTRIES: u64 = 100_000;

/// Minimal TTL-aware key-value client
#[async_trait]
pub trait KvClient: Send + Sync {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Atomically store `value` if `key` is absent, otherwise keep the
    /// existing value and only reset its TTL.
    async fn set_or_refresh(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
struct KvEntry {
    value: String,
    ttl: Duration,
    deadline: Instant,
}

struct PerEntryTtl;

impl Expiry<String, KvEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &KvEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &KvEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process client backed by a `moka` cache with per-entry TTL.
#[derive(Clone)]
pub struct MokaKvClient {
    cache: Cache<String, KvEntry>,
}

impl Default for MokaKvClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MokaKvClient {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(MAX_CACHE_ENTRIES)
    }

    #[must_use]
    pub fn with_capacity(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }
}

#[async_trait]
impl KvClient for MokaKvClient {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let entry = KvEntry {
            value: value.to_string(),
            ttl,
            deadline: Instant::now() + ttl,
        };
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn set_or_refresh(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let value = value.to_string();
        self.cache
            .entry(key.to_string())
            .and_compute_with(|current| async move {
                let now = Instant::now();
                let value = current
                    .map(|entry| entry.into_value())
                    .filter(|entry| entry.deadline > now)
                    .map_or(value, |entry| entry.value);
                Op::Put(KvEntry {
                    value,
                    ttl,
                    deadline: now + ttl,
                })
            })
            .await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        // moka evicts lazily; the deadline check makes expiry exact
        Ok(self
            .cache
            .get(key)
            .await
            .filter(|entry| entry.deadline > Instant::now())
            .map(|entry| entry.value))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "moka"
    }
}

/// Networked client over a Redis connection manager (reconnects on its own).
#[derive(Clone)]
pub struct RedisKvClient {
    conn: ConnectionManager,
}

impl RedisKvClient {
    /// Connect to `redis://` or `rediss://` URLs.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::StorageError(format!("Invalid Redis URL: {e}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::StorageError(format!("Redis connection failed: {e}")))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvClient for RedisKvClient {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, value, ttl_seconds(ttl))
            .await
            .map_err(|e| StoreError::StorageError(format!("Redis SETEX failed: {e}")))?;
        Ok(())
    }

    async fn set_or_refresh(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let seconds = ttl_seconds(ttl);
        let created: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::StorageError(format!("Redis SET NX failed: {e}")))?;
        if created.is_some() {
            return Ok(());
        }

        let refreshed: bool = conn
            .expire(key, i64::try_from(seconds).unwrap_or(i64::MAX))
            .await
            .map_err(|e| StoreError::StorageError(format!("Redis EXPIRE failed: {e}")))?;
        if !refreshed {
            // Expired between SET NX and EXPIRE
            return self.set_with_ttl(key, value, ttl).await;
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .map_err(|e| StoreError::StorageError(format!("Redis GET failed: {e}")))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .del(key)
            .await
            .map_err(|e| StoreError::StorageError(format!("Redis DEL failed: {e}")))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Whole seconds for Redis, rounding any fraction up.
fn ttl_seconds(ttl: Duration) -> u64 {
    (ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0)).max(1)
}

/// Lookup-only association backend over any [`KvClient`].
pub struct KeyValueAssociationBackend<C> {
    client: C,
}

impl<C: KvClient> KeyValueAssociationBackend<C> {
    #[must_use]
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: KvClient> AssociationBackend for KeyValueAssociationBackend<C> {
    async fn upsert(&self, association: &LogoutAssociation) -> Result<(), StoreError> {
        let key = association.key.storage_key();
        let Ok(ttl) = (association.expires_at - Utc::now()).to_std() else {
            // Already expired: make sure no stale value lingers
            return self.client.delete(&key).await;
        };
        if ttl.is_zero() {
            return self.client.delete(&key).await;
        }

        // An existing key keeps its session id; only the TTL moves
        self.client
            .set_or_refresh(&key, &association.session_id, ttl)
            .await
    }

    async fn lookup(&self, key: &AssociationKey) -> Result<Option<String>, StoreError> {
        self.client.get(&key.storage_key()).await
    }

    async fn enumerate(
        &self,
        _auth_source: &str,
        _name_id_hash: &str,
    ) -> Result<Vec<LogoutAssociation>, StoreError> {
        Err(StoreError::CannotEnumerate)
    }

    async fn remove(&self, key: &AssociationKey) -> Result<(), StoreError> {
        self.client.delete(&key.storage_key()).await
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        Ok(0)
    }

    fn can_enumerate(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        self.client.name()
    }
}
