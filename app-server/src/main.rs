use std::process::ExitCode;

use anyhow::Context;
use app_server::app::assemble;
use app_server::config::Config;
use build_info::BuildInfo;
use envconfig::Envconfig;
use lifecycle::Supervisor;
use tracing::error;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config = Config::init_from_env().context("invalid configuration")?;
    let logger = logging::init(&config.logger).context("failed to initialize logging")?;

    let container = match assemble(
        &config,
        logger,
        BuildInfo::new(env!("CARGO_PKG_VERSION")),
    ) {
        Ok(container) => container,
        Err(e) => {
            error!(error = %e, "failed to assemble application");
            return Ok(ExitCode::FAILURE);
        }
    };

    let status = Supervisor::with_os_signals(container.lifecycle())
        .context("failed to install signal handlers")?
        .with_shutdown_timeout(config.shutdown_timeout())
        .run()
        .await;
    Ok(status.into())
}
