//! Logout association types and key normalization
//!
//! An association links `(auth source, NameID, IdP session index)` to the
//! local session opened when the assertion was accepted. NameIDs are stored
//! only as a hash, and long session indexes are hashed to fit the key.

use crate::models::NameId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Session indexes longer than this are stored as their SHA-1 hex digest.
pub const MAX_SESSION_INDEX_LEN: usize = 50;

/// Prefix of the composite key used by key-value backends.
pub const KV_KEY_PREFIX: &str = "saml.logout";

/// Normalized association key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssociationKey {
    pub auth_source: String,
    pub name_id_hash: String,
    pub session_index: String,
}

impl AssociationKey {
    /// Normalize raw protocol values into a key.
    #[must_use]
    pub fn new(auth_source: &str, name_id: &NameId, session_index: &str) -> Self {
        Self {
            auth_source: auth_source.to_string(),
            name_id_hash: identity_hash(name_id),
            session_index: normalize_session_index(session_index),
        }
    }

    /// Composite key for key-value stores.
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!(
            "{KV_KEY_PREFIX}:{}:{}:{}",
            self.auth_source, self.name_id_hash, self.session_index
        )
    }
}

/// A stored association and its expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutAssociation {
    pub key: AssociationKey,
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

impl LogoutAssociation {
    /// Expired entries are invisible to lookups.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Deterministic hash of a `NameID`, independent of field order.
#[must_use]
pub fn identity_hash(name_id: &NameId) -> String {
    hash_name_id_fields(name_id.to_fields())
}

/// SHA-1 over the fields sorted by name and serialized as a JSON object.
pub fn hash_name_id_fields<I>(fields: I) -> String
where
    I: IntoIterator<Item = (String, String)>,
{
    let sorted: BTreeMap<String, String> = fields.into_iter().collect();
    let object: Map<String, Value> = sorted
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    let serialized = Value::Object(object).to_string();
    hex::encode(openssl::sha::sha1(serialized.as_bytes()))
}

/// Verbatim when short enough, otherwise its SHA-1 hex digest.
#[must_use]
pub fn normalize_session_index(session_index: &str) -> String {
    if session_index.chars().count() <= MAX_SESSION_INDEX_LEN {
        session_index.to_string()
    } else {
        hex::encode(openssl::sha::sha1(session_index.as_bytes()))
    }
}

/// Local stand-in for an IdP that sent no session index.
///
/// A LogoutRequest naming a specific index can never match it; only an
/// index-less logout (enumerating the principal's sessions) reaches it.
#[must_use]
pub fn generate_session_index() -> String {
    format!("_{}", Uuid::new_v4().simple())
}

/// Association store errors
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// Backend failure (connection, query, serialization)
    #[error("Association storage error: {0}")]
    StorageError(String),

    /// The backend cannot list associations and no session index was given
    #[error("Backend cannot enumerate associations without session indexes")]
    CannotEnumerate,
}
