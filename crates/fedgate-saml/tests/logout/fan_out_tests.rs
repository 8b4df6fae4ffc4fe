//! Concurrent fan-out with per-target deadlines

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use fedgate_saml::{
        LogoutDispatcher, LogoutTarget, SamlError, SamlResult, SloOrchestrator, TargetStatus,
    };
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    /// Answers after a fixed delay per target; an unknown target fails.
    struct DelayedDispatcher {
        delays: HashMap<&'static str, Duration>,
    }

    #[async_trait]
    impl LogoutDispatcher<()> for DelayedDispatcher {
        async fn dispatch(&self, target_id: &str, _payload: ()) -> SamlResult<()> {
            let Some(delay) = self.delays.get(target_id) else {
                return Err(SamlError::InternalError(format!("no SLO endpoint for {target_id}")));
            };
            tokio::time::sleep(*delay).await;
            Ok(())
        }
    }

    fn orchestrator(delays: &[(&'static str, u64)]) -> SloOrchestrator<()> {
        let delays = delays
            .iter()
            .map(|(id, ms)| (*id, Duration::from_millis(*ms)))
            .collect();
        SloOrchestrator::new(Arc::new(DelayedDispatcher { delays }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_sp_times_out_while_others_complete() {
        let orchestrator = orchestrator(&[("a", 100), ("b", 60_000), ("c", 250)]);
        let timeout = Duration::from_secs(2);
        let targets = ["a", "b", "c"]
            .into_iter()
            .map(|id| LogoutTarget::new(id, timeout, ()))
            .collect();

        let started = tokio::time::Instant::now();
        let outcome = orchestrator.run(targets).await;
        assert!(started.elapsed() < Duration::from_secs(3));

        assert_eq!(outcome.status("a"), Some(TargetStatus::Completed));
        assert_eq!(outcome.status("b"), Some(TargetStatus::TimedOut));
        assert_eq!(outcome.status("c"), Some(TargetStatus::Completed));
        assert!(!outcome.is_success());

        match outcome.into_result() {
            Err(SamlError::PartialLogoutFailure {
                completed,
                failed,
                timed_out,
            }) => {
                assert_eq!(completed.into_iter().collect::<Vec<_>>(), vec!["a", "c"]);
                assert!(failed.is_empty());
                assert_eq!(timed_out.into_iter().collect::<Vec<_>>(), vec!["b"]);
            }
            other => panic!("expected partial logout failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_reported_with_reason() {
        let orchestrator = orchestrator(&[("a", 10)]);
        let outcome = orchestrator
            .run(vec![
                LogoutTarget::new("a", Duration::from_secs(1), ()),
                LogoutTarget::new("unknown", Duration::from_secs(1), ()),
            ])
            .await;

        assert_eq!(outcome.total(), 2);
        match outcome.status("unknown") {
            Some(TargetStatus::Failed(reason)) => assert!(reason.contains("no SLO endpoint")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_sp_confirmed_is_success() {
        let orchestrator = orchestrator(&[("a", 10), ("b", 20)]);
        let outcome = orchestrator
            .run(vec![
                LogoutTarget::new("a", Duration::from_secs(1), ()),
                LogoutTarget::new("b", Duration::from_secs(1), ()),
            ])
            .await;

        let completed = outcome.into_result().unwrap();
        assert_eq!(completed.len(), 2);
    }
}
