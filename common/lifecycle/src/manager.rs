//! Lifecycle manager: service registration, signal trapping, concurrent run and
//! the completion barrier that holds `run` open until every service has stopped.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::LifecycleError;
use crate::metrics;
use crate::policy::ShutdownPolicy;
use crate::service::{Service, ServiceContext};
use crate::signals;

/// Options for creating a lifecycle manager.
#[derive(Clone, Debug)]
pub struct ManagerOptions {
    pub name: String,
    /// Install SIGINT/SIGTERM handlers (default: true).
    pub trap_signals: bool,
    /// Policy handed to services registered without their own.
    pub shutdown_policy: ShutdownPolicy,
    /// Return once every service task has finished, even if shutdown was never
    /// requested (default: false).
    pub exit_when_idle: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            trap_signals: true,
            shutdown_policy: ShutdownPolicy::default(),
            exit_when_idle: false,
        }
    }
}

pub struct ManagerBuilder {
    options: ManagerOptions,
}

impl ManagerBuilder {
    pub fn with_trap_signals(mut self, trap: bool) -> Self {
        self.options.trap_signals = trap;
        self
    }

    pub fn with_shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.options.shutdown_policy = policy;
        self
    }

    pub fn with_exit_when_idle(mut self, exit: bool) -> Self {
        self.options.exit_when_idle = exit;
        self
    }

    pub fn build(self) -> Manager {
        Manager::new(self.options)
    }
}

/// How a registered service's task ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// Stopped on request, or exited cleanly on its own.
    Stopped,
    /// Shutdown deadline elapsed and the service was force-stopped.
    ForceStopped { elapsed: Duration },
    /// `run` returned a genuine error.
    Failed { reason: String },
    /// `init` failed; the service never started.
    InitFailed { reason: String },
    /// The task ended without reporting, e.g. it panicked.
    Died,
}

impl ServiceOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, ServiceOutcome::Stopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceOutcome::Stopped => "stopped",
            ServiceOutcome::ForceStopped { .. } => "force_stopped",
            ServiceOutcome::Failed { .. } => "failed",
            ServiceOutcome::InitFailed { .. } => "init_failed",
            ServiceOutcome::Died => "died",
        }
    }
}

/// Aggregate result of [`Manager::run`], in registration order.
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    pub services: Vec<(String, ServiceOutcome)>,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.services.iter().all(|(_, o)| o.is_clean())
    }

    pub fn outcome(&self, name: &str) -> Option<&ServiceOutcome> {
        self.services
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, o)| o)
    }

    /// Services whose `init` succeeded and whose `run` was awaited.
    pub fn started(&self) -> usize {
        self.services
            .iter()
            .filter(|(_, o)| !matches!(o, ServiceOutcome::InitFailed { .. }))
            .count()
    }

    pub fn init_failures(&self) -> usize {
        self.services.len() - self.started()
    }
}

struct Registration {
    name: String,
    policy: ShutdownPolicy,
    service: Box<dyn Service>,
}

/// Orchestrates a set of independent services: starts each one on its own task,
/// waits for the stopping signal, then waits for every task to finish.
pub struct Manager {
    options: ManagerOptions,
    registrations: Vec<Registration>,
}

impl Manager {
    pub fn new(options: ManagerOptions) -> Self {
        Self {
            options,
            registrations: Vec::new(),
        }
    }

    pub fn builder(name: impl Into<String>) -> ManagerBuilder {
        ManagerBuilder {
            options: ManagerOptions {
                name: name.into(),
                ..ManagerOptions::default()
            },
        }
    }

    /// Register a service under the manager's default shutdown policy.
    pub fn register<S: Service>(&mut self, name: &str, service: S) {
        let policy = self.options.shutdown_policy.clone();
        self.register_with_policy(name, service, policy);
    }

    pub fn register_with_policy<S: Service>(
        &mut self,
        name: &str,
        service: S,
        policy: ShutdownPolicy,
    ) {
        debug!(
            service = %name,
            deadline_secs = policy.deadline().as_secs_f64(),
            "Lifecycle: service registered"
        );
        self.registrations.push(Registration {
            name: name.to_string(),
            policy,
            service: Box::new(service),
        });
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Start every service and block until shutdown completes.
    ///
    /// Shutdown begins when `parent` is cancelled or, with signal trapping
    /// enabled, on SIGINT/SIGTERM. Returns only after every started service's
    /// `run` has returned; services bound their own shutdown with an
    /// [`Escalation`](crate::Escalation), so there is no timeout here.
    pub async fn run(self, parent: CancellationToken) -> RunSummary {
        let Manager {
            options,
            registrations,
        } = self;
        let name = options.name;

        info!(manager = %name, services = registrations.len(), "Lifecycle: starting application");

        let stopping = parent.child_token();
        if options.trap_signals {
            let token = stopping.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = signals::wait_for_shutdown_signal() => token.cancel(),
                    _ = token.cancelled() => {}
                }
            });
        }

        let tracker = TaskTracker::new();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut names = Vec::with_capacity(registrations.len());

        for (index, registration) in registrations.into_iter().enumerate() {
            names.push(registration.name.clone());
            let reporter = OutcomeReporter {
                index,
                tx: Some(event_tx.clone()),
            };
            tracker.spawn(drive_service(
                name.clone(),
                registration,
                stopping.clone(),
                reporter,
            ));
        }
        tracker.close();
        drop(event_tx);

        info!(manager = %name, "Lifecycle: application started");

        let trigger = if options.exit_when_idle {
            tokio::select! {
                _ = stopping.cancelled() => cancel_trigger(&parent),
                _ = tracker.wait() => {
                    info!(manager = %name, "Lifecycle: all services exited before shutdown was requested");
                    stopping.cancel();
                    "idle"
                }
            }
        } else {
            stopping.cancelled().await;
            cancel_trigger(&parent)
        };

        metrics::emit_shutdown_initiated(&name, trigger);
        info!(manager = %name, trigger_reason = trigger, "Lifecycle: stopping application");

        let shutdown_clock = Instant::now();
        tracker.wait().await;

        let mut outcomes: Vec<Option<ServiceOutcome>> = vec![None; names.len()];
        while let Some((index, outcome)) = event_rx.recv().await {
            if let Some(slot) = outcomes.get_mut(index) {
                *slot = Some(outcome);
            }
        }

        let summary = RunSummary {
            services: names
                .into_iter()
                .zip(outcomes)
                .map(|(n, o)| (n, o.unwrap_or(ServiceOutcome::Died)))
                .collect(),
        };

        let clean = summary.is_clean();
        metrics::emit_shutdown_completed(&name, clean);
        info!(
            manager = %name,
            clean,
            started = summary.started(),
            init_failures = summary.init_failures(),
            total_duration_secs = shutdown_clock.elapsed().as_secs_f64(),
            "Lifecycle: application stopped"
        );

        summary
    }
}

fn cancel_trigger(parent: &CancellationToken) -> &'static str {
    if parent.is_cancelled() {
        "parent"
    } else {
        "signal"
    }
}

async fn drive_service(
    manager: String,
    registration: Registration,
    stopping: CancellationToken,
    reporter: OutcomeReporter,
) {
    let Registration {
        name,
        policy,
        mut service,
    } = registration;
    let ctx = ServiceContext::new(name.clone(), policy);

    if let Err(e) = service.init(&ctx).await {
        warn!(service = %name, "Lifecycle: service failed to initialize: {e}");
        metrics::emit_service_init_failed(&manager, &name);
        reporter.report(ServiceOutcome::InitFailed {
            reason: e.to_string(),
        });
        return;
    }

    info!(service = %name, "Lifecycle: service started");
    let result = service.run(stopping.clone()).await;
    if !stopping.is_cancelled() {
        info!(service = %name, "Lifecycle: service exited before shutdown was requested");
    }
    reporter.report(classify(&name, result));
}

fn classify(name: &str, result: Result<(), LifecycleError>) -> ServiceOutcome {
    match result {
        Ok(()) | Err(LifecycleError::Closed) => ServiceOutcome::Stopped,
        Err(LifecycleError::AlreadyStopped { .. }) => {
            debug!(service = %name, "Lifecycle: service was already stopped");
            ServiceOutcome::Stopped
        }
        // The escalator has already warned about the forced stop.
        Err(LifecycleError::ShutdownDeadlineExceeded { elapsed, .. }) => {
            info!(service = %name, elapsed_secs = elapsed.as_secs_f64(), "Lifecycle: service force-stopped");
            ServiceOutcome::ForceStopped { elapsed }
        }
        Err(e) => {
            warn!(service = %name, "Lifecycle: error running service: {e}");
            ServiceOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

/// Sends the task's outcome exactly once. Dropped without reporting (the task
/// panicked or was cancelled) it reports [`ServiceOutcome::Died`].
struct OutcomeReporter {
    index: usize,
    tx: Option<mpsc::UnboundedSender<(usize, ServiceOutcome)>>,
}

impl OutcomeReporter {
    fn report(mut self, outcome: ServiceOutcome) {
        self.send(outcome);
    }

    fn send(&mut self, outcome: ServiceOutcome) {
        if let Some(tx) = self.tx.take() {
            // The receiver lives until every task has finished.
            drop(tx.send((self.index, outcome)));
        }
    }
}

impl Drop for OutcomeReporter {
    fn drop(&mut self) {
        self.send(ServiceOutcome::Died);
    }
}
