use std::process::ExitCode;

use envconfig::Envconfig;
use lifecycle::CancellationToken;
use service_host::config::{Config, Environment};
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_tracing(environment: Environment) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    match environment {
        Environment::Production => tracing_subscriber::registry()
            .with(fmt::layer().json().with_current_span(false))
            .with(filter)
            .init(),
        Environment::Development => tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(filter)
            .init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::init_from_env();
    init_tracing(
        config
            .as_ref()
            .map_or(Environment::Development, |c| c.environment),
    );

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let manager = match service_host::build_manager(&config) {
        Ok(manager) => manager,
        Err(e) => {
            error!("Invalid shutdown policy: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        service_name = %config.service_name,
        address = %config.bind(),
        environment = ?config.environment,
        "Starting service host"
    );

    let summary = manager.run(CancellationToken::new()).await;
    if !summary.is_clean() {
        for (service, outcome) in summary.services.iter().filter(|(_, o)| !o.is_clean()) {
            warn!(service = %service, outcome = outcome.as_str(), "service did not stop cleanly");
        }
    }

    ExitCode::SUCCESS
}
