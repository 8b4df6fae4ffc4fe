//! Association store behavior over the in-memory and key-value backends

#[cfg(test)]
mod tests {
    use crate::common;
    use chrono::{Duration, Utc};
    use fedgate_saml::models::NameId;
    use fedgate_saml::session::{
        hash_name_id_fields, identity_hash, KeyValueAssociationBackend, MokaKvClient,
    };
    use fedgate_saml::{AssociationStore, InMemoryAssociationBackend, PurgePolicy, StoreError};
    use std::sync::Arc;

    const AUTH_ID: &str = "default-sp";

    fn memory_store() -> AssociationStore {
        AssociationStore::new(Arc::new(InMemoryAssociationBackend::new()))
            .with_purge_policy(PurgePolicy::Disabled)
    }

    fn kv_store() -> AssociationStore {
        AssociationStore::new(Arc::new(KeyValueAssociationBackend::new(
            MokaKvClient::new(),
        )))
    }

    #[tokio::test]
    async fn test_added_session_is_collected_by_index() {
        let store = memory_store();
        let name_id = common::name_id();
        store
            .add_session(AUTH_ID, &name_id, Some("_s1"), Utc::now() + Duration::hours(1), "local-1")
            .await
            .unwrap();

        let found = store
            .collect_associations(AUTH_ID, &name_id, &["_s1".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["_s1"], "local-1");
    }

    #[tokio::test]
    async fn test_empty_index_list_collects_every_session() {
        let store = memory_store();
        let name_id = common::name_id();
        let expiry = Utc::now() + Duration::hours(1);
        for (index, session) in [("_s1", "local-1"), ("_s2", "local-2")] {
            store
                .add_session(AUTH_ID, &name_id, Some(index), expiry, session)
                .await
                .unwrap();
        }
        store
            .add_session("other-sp", &name_id, Some("_s3"), expiry, "local-3")
            .await
            .unwrap();

        let found = store
            .collect_associations(AUTH_ID, &name_id, &[])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.values().any(|s| s == "local-1"));
        assert!(found.values().any(|s| s == "local-2"));
    }

    #[tokio::test]
    async fn test_expired_association_is_not_collected() {
        let store = memory_store();
        let name_id = common::name_id();
        store
            .add_session(AUTH_ID, &name_id, Some("_old"), Utc::now() - Duration::seconds(1), "gone")
            .await
            .unwrap();

        let found = store
            .collect_associations(AUTH_ID, &name_id, &["_old".to_string()])
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_other_principal_is_not_collected() {
        let store = memory_store();
        store
            .add_session(
                AUTH_ID,
                &common::name_id(),
                Some("_s1"),
                Utc::now() + Duration::hours(1),
                "local-1",
            )
            .await
            .unwrap();

        let stranger = NameId::new("zzz", fedgate_saml::models::NAMEID_FORMAT_PERSISTENT);
        let found = store
            .collect_associations(AUTH_ID, &stranger, &["_s1".to_string()])
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_identity_hash_ignores_field_order() {
        let forward = vec![
            ("Value".to_string(), "a1b2c3".to_string()),
            ("Format".to_string(), fedgate_saml::models::NAMEID_FORMAT_PERSISTENT.to_string()),
        ];
        let backward: Vec<_> = forward.iter().rev().cloned().collect();

        assert_eq!(hash_name_id_fields(forward.clone()), hash_name_id_fields(backward));
        assert_eq!(hash_name_id_fields(forward), identity_hash(&common::name_id()));
    }

    #[tokio::test]
    async fn test_long_index_matches_its_hashed_form() {
        let store = memory_store();
        let name_id = common::name_id();
        let long_index = "x".repeat(200);
        let stored = store
            .add_session(
                AUTH_ID,
                &name_id,
                Some(&long_index),
                Utc::now() + Duration::hours(1),
                "local-1",
            )
            .await
            .unwrap();
        assert_eq!(stored.len(), 40);

        let hashed = hex::encode(openssl::sha::sha1(long_index.as_bytes()));
        assert_eq!(stored, hashed);

        let by_raw = store
            .collect_associations(AUTH_ID, &name_id, &[long_index])
            .await
            .unwrap();
        let by_hash = store
            .collect_associations(AUTH_ID, &name_id, &[hashed])
            .await
            .unwrap();
        assert_eq!(by_raw, by_hash);
        assert_eq!(by_hash.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_index_is_generated() {
        let store = memory_store();
        let name_id = common::name_id();
        let generated = store
            .add_session(AUTH_ID, &name_id, None, Utc::now() + Duration::hours(1), "local-1")
            .await
            .unwrap();
        assert!(generated.starts_with('_'));

        let found = store
            .collect_associations(AUTH_ID, &name_id, &[])
            .await
            .unwrap();
        assert_eq!(found.get(&generated).map(String::as_str), Some("local-1"));
    }

    #[tokio::test]
    async fn test_key_value_store_round_trip() {
        let store = kv_store();
        let name_id = common::name_id();
        store
            .add_session(AUTH_ID, &name_id, Some("_s1"), Utc::now() + Duration::hours(1), "local-1")
            .await
            .unwrap();

        let found = store
            .collect_associations(AUTH_ID, &name_id, &["_s1".to_string(), "_nope".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["_s1"], "local-1");
    }

    #[tokio::test]
    async fn test_key_value_store_cannot_enumerate() {
        let store = kv_store();
        assert!(!store.can_enumerate(&[]));
        assert!(store.can_enumerate(&["_s1".to_string()]));

        let err = store
            .collect_associations(AUTH_ID, &common::name_id(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CannotEnumerate));
    }

    #[tokio::test]
    async fn test_purge_removes_only_expired() {
        let backend = Arc::new(InMemoryAssociationBackend::new());
        let store = AssociationStore::new(backend.clone()).with_purge_policy(PurgePolicy::Disabled);
        let name_id = common::name_id();
        let now = Utc::now();
        store
            .add_session(AUTH_ID, &name_id, Some("_old"), now - Duration::minutes(1), "old")
            .await
            .unwrap();
        store
            .add_session(AUTH_ID, &name_id, Some("_new"), now + Duration::hours(1), "new")
            .await
            .unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(backend.len().await, 1);
    }
}
