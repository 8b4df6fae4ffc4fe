//! Validity window, audience and recipient tests

#[cfg(test)]
mod tests {
    use crate::common::{self, ACS_URL};
    use chrono::{Duration, Utc};
    use fedgate_saml::models::AssertionItem;
    use fedgate_saml::{SamlError, TrustValidator};

    fn signed_response(
        idp: &common::Credential,
        assertion: fedgate_saml::models::Assertion,
        now: chrono::DateTime<Utc>,
    ) -> fedgate_saml::models::Response {
        let mut assertion = assertion;
        common::sign_assertion(&mut assertion, idp, Vec::new());
        common::response(vec![AssertionItem::Plain(assertion)], now)
    }

    #[test]
    fn test_expired_assertion_is_rejected() {
        let now = Utc::now();
        let idp = common::self_signed("idp");
        let mut assertion = common::assertion(now);
        assertion.not_before = Some(now - Duration::minutes(20));
        assertion.not_on_or_after = Some(now - Duration::minutes(10));
        let response = signed_response(&idp, assertion, now);

        let err = TrustValidator::new()
            .process_response_at(
                &common::own_metadata(),
                &common::peer_with_cert(&idp),
                &response,
                ACS_URL,
                now,
            )
            .unwrap_err();
        assert!(matches!(err, SamlError::ExpiredAssertion(_)));
    }

    #[test]
    fn test_not_yet_valid_assertion_is_rejected() {
        let now = Utc::now();
        let idp = common::self_signed("idp");
        let mut assertion = common::assertion(now);
        assertion.not_before = Some(now + Duration::minutes(5));
        let response = signed_response(&idp, assertion, now);

        let err = TrustValidator::new()
            .process_response_at(
                &common::own_metadata(),
                &common::peer_with_cert(&idp),
                &response,
                ACS_URL,
                now,
            )
            .unwrap_err();
        assert!(matches!(err, SamlError::ExpiredAssertion(_)));
    }

    #[test]
    fn test_small_clock_drift_is_tolerated() {
        let now = Utc::now();
        let idp = common::self_signed("idp");
        let mut assertion = common::assertion(now);
        assertion.not_before = Some(now + Duration::seconds(30));
        let response = signed_response(&idp, assertion, now);

        let result = TrustValidator::new().process_response_at(
            &common::own_metadata(),
            &common::peer_with_cert(&idp),
            &response,
            ACS_URL,
            now,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_replay_after_expiry_is_rejected() {
        let issued = Utc::now();
        let idp = common::self_signed("idp");
        let response = signed_response(&idp, common::assertion(issued), issued);
        let validator = TrustValidator::new();
        let own = common::own_metadata();
        let peer = common::peer_with_cert(&idp);

        assert!(validator
            .process_response_at(&own, &peer, &response, ACS_URL, issued)
            .is_ok());

        let replayed_at = issued + Duration::minutes(5) + Duration::seconds(61);
        let err = validator
            .process_response_at(&own, &peer, &response, ACS_URL, replayed_at)
            .unwrap_err();
        assert!(matches!(err, SamlError::ExpiredAssertion(_)));
    }

    #[test]
    fn test_expired_idp_session_is_rejected() {
        let now = Utc::now();
        let idp = common::self_signed("idp");
        let mut assertion = common::assertion(now);
        assertion.session_not_on_or_after = Some(now - Duration::minutes(2));
        let response = signed_response(&idp, assertion, now);

        let err = TrustValidator::new()
            .process_response_at(
                &common::own_metadata(),
                &common::peer_with_cert(&idp),
                &response,
                ACS_URL,
                now,
            )
            .unwrap_err();
        assert!(matches!(err, SamlError::ExpiredAssertion(_)));
    }

    #[test]
    fn test_foreign_audience_is_rejected() {
        let now = Utc::now();
        let idp = common::self_signed("idp");
        let mut assertion = common::assertion(now);
        assertion.audiences = vec!["https://other-sp.example.com".to_string()];
        let response = signed_response(&idp, assertion, now);

        let err = TrustValidator::new()
            .process_response_at(
                &common::own_metadata(),
                &common::peer_with_cert(&idp),
                &response,
                ACS_URL,
                now,
            )
            .unwrap_err();
        assert!(matches!(err, SamlError::AudienceMismatch { .. }));
    }

    #[test]
    fn test_wrong_endpoint_is_recipient_mismatch() {
        let now = Utc::now();
        let idp = common::self_signed("idp");
        let response = signed_response(&idp, common::assertion(now), now);

        let err = TrustValidator::new()
            .process_response_at(
                &common::own_metadata(),
                &common::peer_with_cert(&idp),
                &response,
                "https://sp.example.com/other/acs",
                now,
            )
            .unwrap_err();
        assert!(matches!(err, SamlError::RecipientMismatch { .. }));
    }

    #[test]
    fn test_error_status_is_reported_before_trust() {
        let now = Utc::now();
        let idp = common::self_signed("idp");
        let mut response = common::response(Vec::new(), now);
        response.status.code = "urn:oasis:names:tc:SAML:2.0:status:Responder".to_string();

        let err = TrustValidator::new()
            .process_response_at(
                &common::own_metadata(),
                &common::peer_with_cert(&idp),
                &response,
                ACS_URL,
                now,
            )
            .unwrap_err();
        assert!(matches!(err, SamlError::Status { .. }));
    }
}
