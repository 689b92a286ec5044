use tracing::{info, warn};

/// Resolves on the first SIGINT or SIGTERM. Later signals are coalesced by the
/// caller's cancellation token.
#[cfg(unix)]
pub(crate) async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "Lifecycle: failed to install SIGTERM handler, only SIGINT is trapped");
            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = wait_for_ctrl_c() => {},
        _ = sigterm.recv() => info!("Lifecycle: received SIGTERM"),
    }
}

#[cfg(not(unix))]
pub(crate) async fn wait_for_shutdown_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Lifecycle: received SIGINT"),
        Err(e) => {
            warn!(error = %e, "Lifecycle: failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    }
}
