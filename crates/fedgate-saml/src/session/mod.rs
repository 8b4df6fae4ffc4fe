//! Logout associations and local session handles
//!
//! - [`AssociationStore`] over a relational, key-value or in-memory backend
//! - [`SessionResolver`] for turning stored session ids back into sessions

pub mod kv;
pub mod memory;
pub mod postgres;
pub mod resolver;
pub mod store;
pub mod types;

pub use kv::{KeyValueAssociationBackend, KvClient, MokaKvClient, RedisKvClient};
pub use memory::InMemoryAssociationBackend;
pub use postgres::PostgresAssociationBackend;
pub use resolver::{InMemorySessionRegistry, LocalSession, Session, SessionResolver};
pub use store::{AssociationBackend, AssociationStore, PurgePolicy, DEFAULT_PURGE_PROBABILITY};
pub use types::{
    generate_session_index, hash_name_id_fields, identity_hash, normalize_session_index,
    AssociationKey, LogoutAssociation, StoreError, MAX_SESSION_INDEX_LEN,
};
