//! Inbound LogoutRequest validation tests

#[cfg(test)]
mod tests {
    use crate::common::{self, IDP_ENTITY_ID};
    use chrono::{Duration, Utc};
    use fedgate_saml::models::Signature;
    use fedgate_saml::services::{
        parse_logout_request, simple_sign_content, SigningCredentials, SignedMessage,
    };
    use fedgate_saml::{Metadata, SamlError, SloBuilder, TrustValidator};
    use serde_json::json;

    const SLO_URL: &str = "https://sp.example.com/saml/slo";

    fn signed_request(idp: &common::Credential, destination: &str) -> SignedMessage {
        let credentials = SigningCredentials::from_pem(&idp.cert_pem(), &idp.key_pem()).unwrap();
        SloBuilder::new(IDP_ENTITY_ID.to_string(), credentials)
            .build_logout_request(
                destination,
                &common::name_id(),
                &["_idp_session_1".to_string()],
            )
            .unwrap()
    }

    fn signature_of(message: &SignedMessage) -> Signature {
        Signature {
            algorithm: message.sig_alg.to_string(),
            value: message.signature.clone(),
            certificates: Vec::new(),
        }
    }

    fn content_of(message: &SignedMessage) -> Vec<u8> {
        simple_sign_content(message.parameter, &message.value, None, message.sig_alg)
    }

    #[test]
    fn test_signed_request_is_accepted() {
        let idp = common::self_signed("idp");
        let message = signed_request(&idp, SLO_URL);
        let request = parse_logout_request(&message.value).unwrap();

        assert_eq!(request.issuer, IDP_ENTITY_ID);
        assert_eq!(request.session_indexes, vec!["_idp_session_1".to_string()]);

        let result = TrustValidator::new().validate_logout_request(
            &common::peer_with_cert(&idp),
            &request,
            Some(&signature_of(&message)),
            &content_of(&message),
            SLO_URL,
            Utc::now(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_unsigned_request_rejected_by_default() {
        let idp = common::self_signed("idp");
        let message = signed_request(&idp, SLO_URL);
        let request = parse_logout_request(&message.value).unwrap();

        let err = TrustValidator::new()
            .validate_logout_request(
                &common::peer_with_cert(&idp),
                &request,
                None,
                &content_of(&message),
                SLO_URL,
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, SamlError::UntrustedMessage(_)));
    }

    #[test]
    fn test_unsigned_request_allowed_when_validation_disabled() {
        let idp = common::self_signed("idp");
        let peer = Metadata::from_value(json!({
            "entityid": IDP_ENTITY_ID,
            "certData": idp.cert_b64(),
            "validate.logout": false,
        }))
        .unwrap();
        let message = signed_request(&idp, SLO_URL);
        let request = parse_logout_request(&message.value).unwrap();

        let result = TrustValidator::new().validate_logout_request(
            &peer,
            &request,
            None,
            &content_of(&message),
            SLO_URL,
            Utc::now(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_signature_by_other_key_is_untrusted() {
        let idp = common::self_signed("idp");
        let attacker = common::self_signed("attacker");
        let message = signed_request(&attacker, SLO_URL);
        let request = parse_logout_request(&message.value).unwrap();

        let err = TrustValidator::new()
            .validate_logout_request(
                &common::peer_with_cert(&idp),
                &request,
                Some(&signature_of(&message)),
                &content_of(&message),
                SLO_URL,
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, SamlError::UntrustedMessage(_)));
    }

    #[test]
    fn test_destination_must_match_endpoint() {
        let idp = common::self_signed("idp");
        let message = signed_request(&idp, "https://elsewhere.example.com/slo");
        let request = parse_logout_request(&message.value).unwrap();

        let err = TrustValidator::new()
            .validate_logout_request(
                &common::peer_with_cert(&idp),
                &request,
                Some(&signature_of(&message)),
                &content_of(&message),
                SLO_URL,
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, SamlError::RecipientMismatch { .. }));
    }

    #[test]
    fn test_expired_request_is_rejected() {
        let idp = common::self_signed("idp");
        let message = signed_request(&idp, SLO_URL);
        let mut request = parse_logout_request(&message.value).unwrap();
        let now = Utc::now();
        request.not_on_or_after = Some(now - Duration::minutes(5));

        let err = TrustValidator::new()
            .validate_logout_request(
                &common::peer_with_cert(&idp),
                &request,
                Some(&signature_of(&message)),
                &content_of(&message),
                SLO_URL,
                now,
            )
            .unwrap_err();
        assert!(matches!(err, SamlError::ExpiredAssertion(_)));
    }
}
