//! Back-channel LogoutRequest delivery against a mock SP

#[cfg(test)]
mod tests {
    use crate::common::{self, IDP_ENTITY_ID};
    use fedgate_saml::services::SigningCredentials;
    use fedgate_saml::{
        BackChannelDispatcher, BackChannelLogout, LogoutTarget, SloBuilder, SloOrchestrator,
        TargetStatus,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dispatcher() -> BackChannelDispatcher {
        let idp = common::self_signed("idp");
        let credentials = SigningCredentials::from_pem(&idp.cert_pem(), &idp.key_pem()).unwrap();
        BackChannelDispatcher::new(SloBuilder::new(IDP_ENTITY_ID.to_string(), credentials))
            .unwrap()
    }

    fn target(id: &str, destination: String) -> LogoutTarget<BackChannelLogout> {
        LogoutTarget::new(
            id,
            Duration::from_secs(5),
            BackChannelLogout {
                destination,
                name_id: common::name_id(),
                session_indexes: vec!["_idp_session_1".to_string()],
            },
        )
    }

    #[tokio::test]
    async fn test_logout_request_posted_to_each_sp() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sp-a/slo"))
            .and(body_string_contains("SAMLRequest="))
            .and(body_string_contains("SigAlg="))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/sp-b/slo"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let orchestrator = SloOrchestrator::new(Arc::new(dispatcher()));
        let outcome = orchestrator
            .run(vec![
                target("sp-a", format!("{}/sp-a/slo", server.uri())),
                target("sp-b", format!("{}/sp-b/slo", server.uri())),
            ])
            .await;

        assert_eq!(outcome.status("sp-a"), Some(TargetStatus::Completed));
        assert!(matches!(outcome.status("sp-b"), Some(TargetStatus::Failed(_))));
    }

    #[tokio::test]
    async fn test_unresponsive_sp_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/slow/slo"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let orchestrator = SloOrchestrator::new(Arc::new(dispatcher()));
        let mut slow = target("slow", format!("{}/slow/slo", server.uri()));
        slow.timeout = Duration::from_millis(200);
        let outcome = orchestrator.run(vec![slow]).await;

        assert_eq!(outcome.status("slow"), Some(TargetStatus::TimedOut));
    }

    #[tokio::test]
    async fn test_private_destination_is_refused_without_request() {
        let orchestrator = SloOrchestrator::new(Arc::new(dispatcher()));
        let outcome = orchestrator
            .run(vec![target("internal", "https://10.0.0.7/slo".to_string())])
            .await;

        match outcome.status("internal") {
            Some(TargetStatus::Failed(reason)) => assert!(reason.contains("not allowed")),
            other => panic!("expected refusal, got {other:?}"),
        }
    }
}
