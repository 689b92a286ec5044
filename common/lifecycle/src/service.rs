//! The contract every managed service implements.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::LifecycleError;
use crate::policy::ShutdownPolicy;

/// Setup context handed to [`Service::init`].
#[derive(Clone, Debug)]
pub struct ServiceContext {
    name: String,
    shutdown_policy: ShutdownPolicy,
}

impl ServiceContext {
    pub fn new(name: impl Into<String>, shutdown_policy: ShutdownPolicy) -> Self {
        Self {
            name: name.into(),
            shutdown_policy,
        }
    }

    /// Name the service was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schedule the service should hand to its [`Escalation`](crate::Escalation).
    pub fn shutdown_policy(&self) -> &ShutdownPolicy {
        &self.shutdown_policy
    }
}

/// A long-running unit of work driven by the [`Manager`](crate::Manager).
///
/// `init` runs once and may block while acquiring resources. `run` serves until
/// `stopping` is cancelled or an unrecoverable error occurs, and must return
/// within its shutdown policy's deadline once cancellation is observed. Return
/// `Ok(())` or [`LifecycleError::Closed`] for a requested stop.
#[async_trait]
pub trait Service: Send + 'static {
    async fn init(&mut self, ctx: &ServiceContext) -> Result<(), LifecycleError>;

    async fn run(&mut self, stopping: CancellationToken) -> Result<(), LifecycleError>;
}
