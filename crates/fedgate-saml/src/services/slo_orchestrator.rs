//! Fan-out of one logout event to many targets
//!
//! Every target is dispatched as its own task with its own deadline. Tasks
//! report over a channel to a single supervisor loop, which sleeps until
//! the earliest pending deadline, marks late targets as timed out and
//! aborts them. A timed-out target is never retried. The run finishes once
//! no target is pending.

use crate::error::{SamlError, SamlResult};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinSet};
use tokio::time::Instant;

/// One party to notify.
#[derive(Debug, Clone)]
pub struct LogoutTarget<T> {
    /// Unique within a run
    pub id: String,
    pub timeout: Duration,
    pub payload: T,
}

impl<T> LogoutTarget<T> {
    pub fn new(id: impl Into<String>, timeout: Duration, payload: T) -> Self {
        Self {
            id: id.into(),
            timeout,
            payload,
        }
    }
}

/// Performs the logout of a single target.
#[async_trait]
pub trait LogoutDispatcher<T>: Send + Sync {
    async fn dispatch(&self, target_id: &str, payload: T) -> SamlResult<()>;
}

/// Per-target state during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetStatus {
    Pending,
    Completed,
    Failed(String),
    TimedOut,
}

/// Final state of every target in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogoutOutcome {
    pub completed: BTreeSet<String>,
    pub failed: BTreeMap<String, String>,
    pub timed_out: BTreeSet<String>,
}

impl LogoutOutcome {
    /// Every target confirmed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.timed_out.is_empty()
    }

    /// Status of one target; `None` for ids that were not part of the run.
    #[must_use]
    pub fn status(&self, target_id: &str) -> Option<TargetStatus> {
        if self.completed.contains(target_id) {
            Some(TargetStatus::Completed)
        } else if let Some(reason) = self.failed.get(target_id) {
            Some(TargetStatus::Failed(reason.clone()))
        } else if self.timed_out.contains(target_id) {
            Some(TargetStatus::TimedOut)
        } else {
            None
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len() + self.timed_out.len()
    }

    /// Completed ids, or [`SamlError::PartialLogoutFailure`] if anything
    /// failed or timed out.
    pub fn into_result(self) -> SamlResult<BTreeSet<String>> {
        if self.is_success() {
            Ok(self.completed)
        } else {
            Err(SamlError::PartialLogoutFailure {
                completed: self.completed,
                failed: self.failed,
                timed_out: self.timed_out,
            })
        }
    }

    fn record(&mut self, id: String, result: Result<(), String>) {
        match result {
            Ok(()) => {
                tracing::debug!(target_id = %id, "Logout target completed");
                self.completed.insert(id);
            }
            Err(reason) => {
                tracing::warn!(target_id = %id, reason = %reason, "Logout target failed");
                self.failed.insert(id, reason);
            }
        }
    }
}

type Report = (String, Result<(), String>);

/// Runs logout fan-outs through one dispatcher.
pub struct SloOrchestrator<T> {
    dispatcher: Arc<dyn LogoutDispatcher<T>>,
}

impl<T> Clone for SloOrchestrator<T> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

impl<T: Send + 'static> SloOrchestrator<T> {
    #[must_use]
    pub fn new(dispatcher: Arc<dyn LogoutDispatcher<T>>) -> Self {
        Self { dispatcher }
    }

    /// Dispatch every target and wait until each one has completed, failed
    /// or passed its deadline.
    pub async fn run(&self, targets: Vec<LogoutTarget<T>>) -> LogoutOutcome {
        let (tx, mut rx) = mpsc::unbounded_channel::<Report>();
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<String, (Instant, AbortHandle)> = HashMap::new();
        let mut seen = HashSet::new();
        let mut outcome = LogoutOutcome::default();

        for LogoutTarget {
            id,
            timeout,
            payload,
        } in targets
        {
            if !seen.insert(id.clone()) {
                tracing::warn!(target_id = %id, "Duplicate logout target skipped");
                continue;
            }

            let deadline = Instant::now() + timeout;
            let dispatcher = Arc::clone(&self.dispatcher);
            let tx = tx.clone();
            let task_id = id.clone();
            let handle = tasks.spawn(async move {
                let result = AssertUnwindSafe(dispatcher.dispatch(&task_id, payload))
                    .catch_unwind()
                    .await;
                let result = match result {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(panic) => Err(format!("dispatcher panicked: {}", panic_message(&*panic))),
                };
                // The supervisor may already have given up on this target
                let _ = tx.send((task_id, result));
            });
            pending.insert(id, (deadline, handle));
        }
        drop(tx);

        tracing::debug!(targets = pending.len(), "Logout fan-out started");

        loop {
            let Some(next_deadline) = pending.values().map(|(deadline, _)| *deadline).min() else {
                break;
            };
            tokio::select! {
                report = rx.recv() => match report {
                    Some((id, result)) => {
                        if pending.remove(&id).is_some() {
                            outcome.record(id, result);
                        }
                    }
                    None => {
                        // Every sender is gone but targets remain: their tasks died unreported
                        for (id, _) in pending.drain() {
                            outcome.record(id, Err("dispatch task ended without reporting".to_string()));
                        }
                    }
                },
                () = tokio::time::sleep_until(next_deadline) => {
                    let now = Instant::now();
                    let expired: Vec<String> = pending
                        .iter()
                        .filter(|(_, (deadline, _))| *deadline <= now)
                        .map(|(id, _)| id.clone())
                        .collect();
                    for id in expired {
                        if let Some((_, handle)) = pending.remove(&id) {
                            handle.abort();
                            tracing::warn!(target_id = %id, "Logout target timed out");
                            outcome.timed_out.insert(id);
                        }
                    }
                }
            }
        }

        tasks.abort_all();

        tracing::info!(
            completed = outcome.completed.len(),
            failed = outcome.failed.len(),
            timed_out = outcome.timed_out.len(),
            "Logout fan-out finished"
        );

        outcome
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
