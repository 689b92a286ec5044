use std::convert::Infallible;
use std::str::FromStr;
use std::time;

use envconfig::Envconfig;
use lifecycle::{PolicyError, ShutdownPolicy};

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "8080")]
    pub port: u16,

    #[envconfig(from = "SERVICE_NAME", default = "service-host")]
    pub service_name: String,

    #[envconfig(from = "ENVIRONMENT", default = "development")]
    pub environment: Environment,

    /// Elapsed shutdown time at which an info "waiting" notice is logged.
    #[envconfig(from = "SHUTDOWN_NOTICE_MS", default = "2000")]
    pub shutdown_notice: EnvMsDuration,

    /// Elapsed shutdown time at which the warning is logged.
    #[envconfig(from = "SHUTDOWN_ESCALATE_MS", default = "12000")]
    pub shutdown_escalate: EnvMsDuration,

    /// Elapsed shutdown time at which in-flight work is aborted.
    #[envconfig(from = "SHUTDOWN_DEADLINE_MS", default = "30000")]
    pub shutdown_deadline: EnvMsDuration,

    #[envconfig(from = "TRAP_SIGNALS", default = "true")]
    pub trap_signals: bool,
}

impl Config {
    /// Produce a host:port address for binding a TcpListener.
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_policy(&self) -> Result<ShutdownPolicy, PolicyError> {
        ShutdownPolicy::escalating(
            self.shutdown_notice.0,
            self.shutdown_escalate.0,
            self.shutdown_deadline.0,
        )
        .validate()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = Infallible;

    /// Unknown values fall back to development.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            _ => Ok(Environment::Development),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}
