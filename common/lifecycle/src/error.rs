//! Lifecycle error types returned by services and the escalator.

use std::time::Duration;

use thiserror::Error;

/// Errors a [`Service`](crate::Service) returns from `init` or `run`.
///
/// The manager classifies these when a service task finishes: only
/// [`Initialization`](LifecycleError::Initialization) and [`Run`](LifecycleError::Run)
/// count as genuine failures. The rest describe how a requested shutdown ended.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A required resource could not be acquired; the service is never started.
    #[error("service '{service}' failed to initialize: {reason}")]
    Initialization { service: String, reason: String },

    /// Service-specific failure while serving.
    #[error("service '{service}' failed while running: {reason}")]
    Run { service: String, reason: String },

    /// The shutdown deadline elapsed and in-flight work was aborted.
    #[error("service '{service}' was force-stopped after {elapsed:?}")]
    ShutdownDeadlineExceeded { service: String, elapsed: Duration },

    /// The resource was already shut down by another path.
    #[error("service '{service}' was already stopped")]
    AlreadyStopped { service: String },

    /// Marker for "stopped because shutdown was requested".
    #[error("service closed on request")]
    Closed,
}

impl LifecycleError {
    pub fn init(service: impl Into<String>, reason: impl ToString) -> Self {
        Self::Initialization {
            service: service.into(),
            reason: reason.to_string(),
        }
    }

    pub fn run(service: impl Into<String>, reason: impl ToString) -> Self {
        Self::Run {
            service: service.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result of a single graceful-close operation driven by the escalator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CloseError {
    /// The resource had already been closed before the escalator acted.
    #[error("resource already closed")]
    AlreadyClosed,

    #[error("close failed: {0}")]
    Failed(String),
}

/// Rejected shutdown checkpoint schedules.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("shutdown deadline must be greater than zero")]
    ZeroDeadline,

    #[error("checkpoint at {after:?} is not after the previous one at {previous:?}")]
    NotIncreasing { previous: Duration, after: Duration },

    #[error("checkpoint at {after:?} is not before the deadline {deadline:?}")]
    PastDeadline { after: Duration, deadline: Duration },

    #[error("checkpoint at {after:?} lowers severity; notices must escalate")]
    SeverityDecreases { after: Duration },
}
