use http_server::HttpService;
use lifecycle::{Manager, PolicyError};

pub mod config;
pub mod router;

use config::Config;

/// Manager with the HTTP service registered, ready to `run`.
pub fn build_manager(config: &Config) -> Result<Manager, PolicyError> {
    let policy = config.shutdown_policy()?;
    let mut manager = Manager::builder(&config.service_name)
        .with_trap_signals(config.trap_signals)
        .with_shutdown_policy(policy)
        .build();
    manager.register(
        "http",
        HttpService::new(config.bind(), router::router(&config.service_name)),
    );
    Ok(manager)
}
