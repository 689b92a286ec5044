#![allow(dead_code)]

use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lifecycle::{
    CancellationToken, CloseError, Escalation, LifecycleError, Service, ServiceContext,
    ShutdownPolicy,
};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub service: Option<String>,
}

/// Records every event on the current thread. Tests run on the current-thread
/// runtime, so spawned tasks log through the same default subscriber.
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = Self::default();
        let guard = tracing_subscriber::registry()
            .with(capture.clone())
            .set_default();
        (capture, guard)
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, level: Level, service: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.level == level && e.service.as_deref() == Some(service))
            .count()
    }

    pub fn count_matching(&self, level: Level, service: &str, needle: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| {
                e.level == level
                    && e.service.as_deref() == Some(service)
                    && e.message.contains(needle)
            })
            .count()
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    service: Option<String>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "service" => self.service = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            "service" => self.service = Some(format!("{value:?}")),
            _ => {}
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            service: visitor.service,
        });
    }
}

// ---------------------------------------------------------------------------
// Test service
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct Counters {
    pub inits: Arc<AtomicUsize>,
    pub runs: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub forced: Arc<AtomicUsize>,
    pub completed: Arc<AtomicUsize>,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug)]
pub enum Behavior {
    /// Close finishes this long after shutdown begins.
    CloseAfter(Duration),
    /// Close never finishes; only the deadline ends it.
    Hang,
    /// `init` fails as if the port were already bound.
    FailInit,
    /// `run` fails on its own before shutdown.
    FailRun,
    /// `run` returns cleanly on its own before shutdown.
    ExitEarly,
    Panic,
}

/// Service that drives its shutdown through an [`Escalation`] with a scripted
/// close operation.
pub struct TestService {
    behavior: Behavior,
    counters: Counters,
    name: String,
    policy: ShutdownPolicy,
}

impl TestService {
    pub fn new(behavior: Behavior, counters: Counters) -> Self {
        Self {
            behavior,
            counters,
            name: String::new(),
            policy: ShutdownPolicy::default(),
        }
    }
}

#[async_trait]
impl Service for TestService {
    async fn init(&mut self, ctx: &ServiceContext) -> Result<(), LifecycleError> {
        self.counters.inits.fetch_add(1, Ordering::SeqCst);
        if let Behavior::FailInit = self.behavior {
            return Err(LifecycleError::init(ctx.name(), "port already bound"));
        }
        self.name = ctx.name().to_string();
        self.policy = ctx.shutdown_policy().clone();
        Ok(())
    }

    async fn run(&mut self, stopping: CancellationToken) -> Result<(), LifecycleError> {
        self.counters.runs.fetch_add(1, Ordering::SeqCst);
        let counters = self.counters.clone();
        let result = match self.behavior {
            Behavior::FailRun => {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err(LifecycleError::run(&self.name, "connection reset"))
            }
            Behavior::ExitEarly => Ok(()),
            Behavior::Panic => panic!("service blew up"),
            Behavior::CloseAfter(_) | Behavior::Hang | Behavior::FailInit => {
                let behavior = self.behavior;
                let closes = counters.closes.clone();
                let forced = counters.forced.clone();
                Escalation::new(self.name.clone(), self.policy.clone())
                    .shutdown_on(
                        &stopping,
                        move |_deadline| async move {
                            closes.fetch_add(1, Ordering::SeqCst);
                            close_for(behavior).await
                        },
                        move || {
                            forced.fetch_add(1, Ordering::SeqCst);
                        },
                    )
                    .await
                    .into_result()
            }
        };
        counters.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}

async fn close_for(behavior: Behavior) -> Result<(), CloseError> {
    match behavior {
        Behavior::CloseAfter(d) => {
            tokio::time::sleep(d).await;
            Ok(())
        }
        _ => std::future::pending().await,
    }
}
