use std::net::SocketAddr;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use lifecycle::{
    CancellationToken, CloseError, Escalation, LifecycleError, Service, ServiceContext,
    ShutdownOutcome, ShutdownPolicy,
};
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinSet};
use tower::Service as _;
use tracing::{debug, info, warn};

/// Path of the readiness probe added by [`HttpService::run`]. The router passed
/// to [`HttpService::new`] must not define it.
pub const READINESS_PATH: &str = "/_readiness";

/// An axum server bound to one listening socket.
///
/// The service runs its own accept loop and owns every connection task, so a
/// forced stop at the deadline tears down in-flight requests along with the
/// listener.
pub struct HttpService {
    address: String,
    router: Router,
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
    name: String,
    policy: ShutdownPolicy,
}

impl HttpService {
    /// `address` is anything [`TcpListener::bind`] accepts, e.g. `"0.0.0.0:8080"`.
    /// Port 0 binds an ephemeral port; see [`local_addr`](HttpService::local_addr).
    pub fn new(address: impl Into<String>, router: Router) -> Self {
        Self {
            address: address.into(),
            router,
            listener: None,
            local_addr: None,
            name: "http".to_string(),
            policy: ShutdownPolicy::default(),
        }
    }

    /// Address actually bound, available once `init` has succeeded.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn exited_early(&self, result: Result<(), JoinError>) -> LifecycleError {
        match result {
            Ok(()) => LifecycleError::AlreadyStopped {
                service: self.name.clone(),
            },
            Err(e) => LifecycleError::run(&self.name, format!("server task failed: {e}")),
        }
    }
}

#[async_trait]
impl Service for HttpService {
    async fn init(&mut self, ctx: &ServiceContext) -> Result<(), LifecycleError> {
        self.name = ctx.name().to_string();
        self.policy = ctx.shutdown_policy().clone();

        let listener = TcpListener::bind(&self.address).await.map_err(|e| {
            LifecycleError::init(ctx.name(), format!("failed to bind {}: {e}", self.address))
        })?;
        let local_addr = listener.local_addr().map_err(|e| {
            LifecycleError::init(ctx.name(), format!("failed to read bound address: {e}"))
        })?;
        info!(service = %self.name, address = %local_addr, "listening");
        self.local_addr = Some(local_addr);
        self.listener = Some(listener);
        Ok(())
    }

    async fn run(&mut self, stopping: CancellationToken) -> Result<(), LifecycleError> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| LifecycleError::init(&self.name, "run called before init"))?;

        let ready = stopping.clone();
        let app = self
            .router
            .clone()
            .route(READINESS_PATH, get(move || readiness(ready.clone())));

        let drain = CancellationToken::new();
        let mut server = tokio::spawn(serve(listener, app, drain.clone(), self.name.clone()));
        let abort = server.abort_handle();

        tokio::select! {
            result = &mut server => return Err(self.exited_early(result)),
            _ = stopping.cancelled() => {}
        }

        let handle = &mut server;
        let report = Escalation::new(self.name.clone(), self.policy.clone())
            .escalate(
                move |_deadline| async move {
                    let already_finished = handle.is_finished();
                    drain.cancel();
                    match handle.await {
                        Ok(()) if already_finished => Err(CloseError::AlreadyClosed),
                        Ok(()) => Ok(()),
                        Err(e) => Err(CloseError::Failed(format!("server task failed: {e}"))),
                    }
                },
                move || abort.abort(),
            )
            .await;

        if report.outcome == ShutdownOutcome::DeadlineExceeded {
            // The aborted task drops its JoinSet, which aborts every connection.
            match server.await {
                Err(e) if !e.is_cancelled() => {
                    warn!(service = %self.name, "server task failed during forced stop: {e}")
                }
                _ => {}
            }
        }

        report.into_result()
    }
}

/// 200 while serving, 503 once the stopping token has fired.
async fn readiness(stopping: CancellationToken) -> StatusCode {
    if stopping.is_cancelled() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

/// Accept connections until `drain` fires, then close idle connections and
/// wait for in-flight requests to finish.
async fn serve(listener: TcpListener, app: Router, drain: CancellationToken, name: String) {
    let builder = AutoBuilder::new(TokioExecutor::new());
    let graceful = GracefulShutdown::new();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = drain.cancelled() => break,
            accepted = listener.accept() => {
                let (socket, remote_addr) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(service = %name, "failed to accept connection: {e}");
                        continue;
                    }
                };
                if let Err(e) = socket.set_nodelay(true) {
                    debug!(service = %name, "failed to set TCP_NODELAY: {e}");
                }

                let app = app.clone();
                let service = hyper::service::service_fn(move |req: Request<Incoming>| {
                    let mut app = app.clone();
                    async move { app.call(req.map(Body::new)).await }
                });
                let conn = builder.serve_connection_with_upgrades(TokioIo::new(socket), service);
                let conn = graceful.watch(conn.into_owned());

                let name = name.clone();
                connections.spawn(async move {
                    if let Err(e) = conn.await {
                        debug!(service = %name, %remote_addr, "connection closed: {e}");
                    }
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    debug!(service = %name, open = connections.len(), "draining connections");
    graceful.shutdown().await;
    while connections.join_next().await.is_some() {}
}
