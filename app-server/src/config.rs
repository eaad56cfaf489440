use std::time::Duration;

use envconfig::Envconfig;
use grpc_server::GrpcConfig;
use http_server::HttpConfig;
use logging::LoggerConfig;
use routing::RouterConfig;

/// Process configuration, read once from the environment by `main` and
/// supplied section by section to the registry.
#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(from = "SHUTDOWN_TIMEOUT_SECS", default = "5")]
    pub shutdown_timeout_secs: u64,

    #[envconfig(from = "METRICS_ENABLED", default = "true")]
    pub metrics_enabled: bool,

    #[envconfig(nested = true)]
    pub http: HttpConfig,

    #[envconfig(nested = true)]
    pub grpc: GrpcConfig,

    #[envconfig(nested = true)]
    pub logger: LoggerConfig,

    #[envconfig(nested = true)]
    pub router: RouterConfig,
}

impl Config {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
