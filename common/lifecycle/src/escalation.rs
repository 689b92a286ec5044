//! Per-service shutdown escalation.
//!
//! An [`Escalation`] turns one cancellation on the stopping token into a bounded
//! shutdown of a single resource: the resource's close operation is called once,
//! then raced against the policy's checkpoint timers. Each checkpoint that fires
//! before close completes logs a notice at its level; reaching the deadline
//! cancels the close operation's deadline token and forces the stop.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{CloseError, LifecycleError};
use crate::metrics;
use crate::policy::{Checkpoint, NoticeLevel, ShutdownPolicy};

/// Position of an escalation along its shutdown timeline, logged at debug on
/// every transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EscalationState {
    /// Stopping token not cancelled yet; service is serving.
    Armed,
    /// Shutdown began; the deadline is set and close has been invoked.
    ShutdownRequested,
    /// Close is in progress. Each fired checkpoint re-enters this state with a
    /// notice.
    Waiting,
    Finished,
}

/// Terminal result of one shutdown attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Close returned before the deadline.
    Closed,
    /// Close reported the resource was already shut down; benign.
    AlreadyClosed,
    /// Close returned an error before the deadline.
    Failed(String),
    /// Deadline elapsed; the resource was force-stopped.
    DeadlineExceeded,
}

impl ShutdownOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownOutcome::Closed => "closed",
            ShutdownOutcome::AlreadyClosed => "already_closed",
            ShutdownOutcome::Failed(_) => "failed",
            ShutdownOutcome::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ShutdownReport {
    pub service: String,
    pub outcome: ShutdownOutcome,
    /// Time from shutdown start until the attempt finished.
    pub elapsed: Duration,
    /// Checkpoints that fired before close completed, in order.
    pub notices: Vec<Checkpoint>,
}

impl ShutdownReport {
    pub fn warnings(&self) -> usize {
        self.notices
            .iter()
            .filter(|cp| cp.level == NoticeLevel::Warn)
            .count()
    }

    /// Map the outcome onto what a service's `run` should return.
    pub fn into_result(self) -> Result<(), LifecycleError> {
        match self.outcome {
            ShutdownOutcome::Closed | ShutdownOutcome::AlreadyClosed => Ok(()),
            ShutdownOutcome::Failed(reason) => Err(LifecycleError::Run {
                service: self.service,
                reason,
            }),
            ShutdownOutcome::DeadlineExceeded => Err(LifecycleError::ShutdownDeadlineExceeded {
                service: self.service,
                elapsed: self.elapsed,
            }),
        }
    }
}

/// One shutdown attempt for one service. Consumed by [`escalate`](Escalation::escalate),
/// so a value can drive at most one shutdown.
pub struct Escalation {
    service: String,
    policy: ShutdownPolicy,
    state: EscalationState,
}

impl Escalation {
    pub fn new(service: impl Into<String>, policy: ShutdownPolicy) -> Self {
        Self {
            service: service.into(),
            policy,
            state: EscalationState::Armed,
        }
    }

    /// Wait for `stopping` to be cancelled, then [`escalate`](Escalation::escalate).
    pub async fn shutdown_on<C, Fut, F>(
        self,
        stopping: &CancellationToken,
        close: C,
        force: F,
    ) -> ShutdownReport
    where
        C: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), CloseError>>,
        F: FnOnce(),
    {
        stopping.cancelled().await;
        self.escalate(close, force).await
    }

    /// Run the shutdown now.
    ///
    /// `close` is called exactly once with a token that is cancelled when the
    /// deadline is reached. `force` is called only if the deadline is reached,
    /// after the close future has been dropped.
    pub async fn escalate<C, Fut, F>(mut self, close: C, force: F) -> ShutdownReport
    where
        C: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), CloseError>>,
        F: FnOnce(),
    {
        let started = Instant::now();
        let deadline = started + self.policy.deadline();
        let deadline_token = CancellationToken::new();

        self.transition(EscalationState::ShutdownRequested);
        info!(
            service = %self.service,
            deadline_secs = self.policy.deadline().as_secs_f64(),
            "Lifecycle: service shutdown requested"
        );

        let mut close = Box::pin(close(deadline_token.clone()));
        let mut notices: Vec<Checkpoint> = Vec::new();
        self.transition(EscalationState::Waiting);

        let outcome = loop {
            let next = self.policy.checkpoints().get(notices.len()).copied();
            let wake = next.map_or(deadline, |cp| started + cp.after);

            tokio::select! {
                biased;

                result = &mut close => {
                    break match result {
                        Ok(()) => ShutdownOutcome::Closed,
                        Err(CloseError::AlreadyClosed) => ShutdownOutcome::AlreadyClosed,
                        Err(CloseError::Failed(reason)) => ShutdownOutcome::Failed(reason),
                    };
                }
                _ = tokio::time::sleep_until(wake) => {
                    match next {
                        Some(cp) => {
                            self.notify(&cp);
                            notices.push(cp);
                            self.transition(EscalationState::Waiting);
                        }
                        None => break ShutdownOutcome::DeadlineExceeded,
                    }
                }
            }
        };

        if outcome == ShutdownOutcome::DeadlineExceeded {
            deadline_token.cancel();
            drop(close);
            force();
        }

        let elapsed = started.elapsed();
        self.finish(&outcome, elapsed);
        self.transition(EscalationState::Finished);

        ShutdownReport {
            service: self.service,
            outcome,
            elapsed,
            notices,
        }
    }

    fn transition(&mut self, next: EscalationState) {
        debug!(service = %self.service, from = ?self.state, to = ?next, "Lifecycle: escalation transition");
        self.state = next;
    }

    fn notify(&self, cp: &Checkpoint) {
        let remaining = self.policy.deadline().saturating_sub(cp.after);
        match cp.level {
            NoticeLevel::Info => info!(
                service = %self.service,
                elapsed_secs = cp.after.as_secs_f64(),
                "Lifecycle: waiting for service to shut down"
            ),
            NoticeLevel::Warn => warn!(
                service = %self.service,
                elapsed_secs = cp.after.as_secs_f64(),
                remaining_secs = remaining.as_secs_f64(),
                "Lifecycle: service is taking unusually long to shut down, forcing stop at deadline"
            ),
        }
    }

    fn finish(&self, outcome: &ShutdownOutcome, elapsed: Duration) {
        let elapsed_secs = elapsed.as_secs_f64();
        match outcome {
            ShutdownOutcome::Closed => info!(
                service = %self.service,
                elapsed_secs,
                result = outcome.as_str(),
                "Lifecycle: service stopped"
            ),
            ShutdownOutcome::AlreadyClosed => debug!(
                service = %self.service,
                elapsed_secs,
                result = outcome.as_str(),
                "Lifecycle: service was already stopped"
            ),
            ShutdownOutcome::Failed(reason) => warn!(
                service = %self.service,
                elapsed_secs,
                result = outcome.as_str(),
                "Lifecycle: error stopping service: {reason}"
            ),
            ShutdownOutcome::DeadlineExceeded => warn!(
                service = %self.service,
                elapsed_secs,
                result = outcome.as_str(),
                "Lifecycle: deadline exceeded, service was force-stopped"
            ),
        }
        metrics::emit_service_shutdown_duration(&self.service, outcome.as_str(), elapsed_secs);
        metrics::emit_service_shutdown_result(&self.service, outcome.as_str());
    }
}
