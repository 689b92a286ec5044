//! Service lifecycle orchestration: a service contract, a manager that runs every
//! registered service concurrently until a stop signal, and a per-service
//! escalator that bounds each shutdown with escalating notices and a forced stop.

mod error;
mod escalation;
mod manager;
mod metrics;
mod policy;
mod service;
mod signals;

pub use error::{CloseError, LifecycleError, PolicyError};
pub use escalation::{Escalation, ShutdownOutcome, ShutdownReport};
pub use manager::{Manager, ManagerBuilder, ManagerOptions, RunSummary, ServiceOutcome};
pub use policy::{Checkpoint, NoticeLevel, ShutdownPolicy};
pub use service::{Service, ServiceContext};

pub use tokio_util::sync::CancellationToken;
