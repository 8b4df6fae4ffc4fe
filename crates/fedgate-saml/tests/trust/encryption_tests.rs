//! Encrypted assertion tests

#[cfg(test)]
mod tests {
    use crate::common::{self, ACS_URL, IDP_ENTITY_ID, SP_ENTITY_ID};
    use chrono::Utc;
    use fedgate_saml::models::AssertionItem;
    use fedgate_saml::{Metadata, SamlError, TrustValidator};
    use serde_json::json;

    fn own_with_key(sp: &common::Credential, encryption_required: bool) -> Metadata {
        Metadata::from_value(json!({
            "entityid": SP_ENTITY_ID,
            "privatekey_pem": sp.key_pem(),
            "assertion.encryption": encryption_required,
        }))
        .unwrap()
    }

    #[test]
    fn test_assertion_encrypted_to_our_key_is_accepted() {
        let now = Utc::now();
        let idp = common::self_signed("idp");
        let sp = common::self_signed("sp");
        let mut assertion = common::assertion(now);
        common::sign_assertion(&mut assertion, &idp, Vec::new());
        let encrypted = common::encrypt_for(&assertion, &sp);
        let response = common::response(vec![AssertionItem::Encrypted(encrypted)], now);

        let accepted = TrustValidator::new()
            .process_response_at(
                &own_with_key(&sp, true),
                &common::peer_with_cert(&idp),
                &response,
                ACS_URL,
                now,
            )
            .unwrap();
        assert_eq!(accepted, assertion);
    }

    #[test]
    fn test_response_signature_covers_encrypted_form() {
        let now = Utc::now();
        let idp = common::self_signed("idp");
        let sp = common::self_signed("sp");
        let encrypted = common::encrypt_for(&common::assertion(now), &sp);
        let mut response = common::response(vec![AssertionItem::Encrypted(encrypted)], now);
        common::sign_response(&mut response, &idp, Vec::new());

        let result = TrustValidator::new().process_response_at(
            &own_with_key(&sp, false),
            &common::peer_with_cert(&idp),
            &response,
            ACS_URL,
            now,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_shared_key_decryption() {
        let now = Utc::now();
        let idp = common::self_signed("idp");
        let shared: [u8; 32] = rand::random();
        let peer = Metadata::from_value(json!({
            "entityid": IDP_ENTITY_ID,
            "certData": idp.cert_b64(),
            "sharedkey": hex::encode(shared),
        }))
        .unwrap();

        let mut assertion = common::assertion(now);
        common::sign_assertion(&mut assertion, &idp, Vec::new());
        let response = common::response(
            vec![AssertionItem::Encrypted(common::encrypt_shared(&assertion, &shared))],
            now,
        );

        let result = TrustValidator::new().process_response_at(
            &common::own_metadata(),
            &peer,
            &response,
            ACS_URL,
            now,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_wrong_private_key_fails_decryption() {
        let now = Utc::now();
        let idp = common::self_signed("idp");
        let sp = common::self_signed("sp");
        let other = common::self_signed("other-sp");
        let mut assertion = common::assertion(now);
        common::sign_assertion(&mut assertion, &idp, Vec::new());
        let response = common::response(
            vec![AssertionItem::Encrypted(common::encrypt_for(&assertion, &other))],
            now,
        );

        let err = TrustValidator::new()
            .process_response_at(
                &own_with_key(&sp, false),
                &common::peer_with_cert(&idp),
                &response,
                ACS_URL,
                now,
            )
            .unwrap_err();
        assert!(matches!(err, SamlError::DecryptionFailed(_)));
    }

    #[test]
    fn test_plain_assertion_rejected_when_we_require_encryption() {
        let now = Utc::now();
        let idp = common::self_signed("idp");
        let sp = common::self_signed("sp");
        let mut assertion = common::assertion(now);
        common::sign_assertion(&mut assertion, &idp, Vec::new());
        let response = common::response(vec![AssertionItem::Plain(assertion)], now);

        let err = TrustValidator::new()
            .process_response_at(
                &own_with_key(&sp, true),
                &common::peer_with_cert(&idp),
                &response,
                ACS_URL,
                now,
            )
            .unwrap_err();
        assert!(matches!(err, SamlError::PolicyViolation(_)));
    }

    #[test]
    fn test_plain_assertion_rejected_when_peer_requires_encryption() {
        let now = Utc::now();
        let idp = common::self_signed("idp");
        let peer = Metadata::from_value(json!({
            "entityid": IDP_ENTITY_ID,
            "certData": idp.cert_b64(),
            "assertion.encryption": true,
        }))
        .unwrap();
        let mut assertion = common::assertion(now);
        common::sign_assertion(&mut assertion, &idp, Vec::new());
        let response = common::response(vec![AssertionItem::Plain(assertion)], now);

        let err = TrustValidator::new()
            .process_response_at(&common::own_metadata(), &peer, &response, ACS_URL, now)
            .unwrap_err();
        assert!(matches!(err, SamlError::PolicyViolation(_)));
    }
}
