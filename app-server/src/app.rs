//! Process assembly: every provider the server is made of, registered once.

use std::sync::Arc;

use build_info::{provide_build_info, BuildInfo};
use common_metrics::provide_metrics;
use grpc_server::provide_grpc_server;
use http_server::provide_http_server;
use lifecycle::{AssemblyError, Container, Lifecycle, Registry};
use logging::Logger;
use routing::RouteRegistry;
use tracing::info;

use crate::config::Config;
use crate::routes::{LivenessRoute, ReadinessRoute, StatusController};

/// Register every provider and build the object graph. Hooks land in the
/// container's lifecycle in construction order: build-info banner, HTTP
/// server, then the gRPC server when enabled.
pub fn assemble(
    config: &Config,
    logger: Logger,
    build: BuildInfo,
) -> Result<Container, AssemblyError> {
    let mut registry = Registry::new();

    registry.supply(config.http.clone())?;
    registry.supply(config.grpc.clone())?;
    registry.supply(config.router.clone())?;
    registry.supply(logger)?;

    provide_build_info(&mut registry, build)?;
    if config.metrics_enabled {
        provide_metrics(&mut registry)?;
    }

    registry.provide_handler(|lifecycle: Arc<Lifecycle>| ReadinessRoute::new(&lifecycle));
    registry.provide_handler(|()| LivenessRoute);
    registry.provide_mount(StatusController::new);
    registry.provide_router()?;

    provide_http_server(&mut registry)?;
    if config.grpc.enabled {
        provide_grpc_server(&mut registry)?;
    }

    let container = registry.build()?;
    info!(
        constructed = ?container.construction_order(),
        hooks = container.lifecycle().len(),
        "application assembled"
    );
    Ok(container)
}
