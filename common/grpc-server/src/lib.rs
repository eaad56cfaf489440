//! gRPC listener component over `tonic`, always serving the standard
//! `grpc.health.v1.Health` service next to the contributed services.

mod config;
mod error;
mod server;

use std::convert::Infallible;
use std::sync::Arc;

use lifecycle::{AssemblyError, Group, Registry};

pub use config::GrpcConfig;
pub use error::GrpcServerError;
pub use server::{GrpcServer, GrpcService, GrpcServiceEntry};

/// Register the [`GrpcServer`] component, fed by every [`GrpcServiceEntry`]
/// contribution, and make sure it gets built.
pub fn provide_grpc_server(registry: &mut Registry) -> Result<(), AssemblyError> {
    registry.provide_component(
        |(config, services): (Arc<GrpcConfig>, Group<GrpcServiceEntry>)| {
            GrpcServer::new(&config, services.into_vec())
        },
    )?;
    registry.invoke(|_: Arc<GrpcServer>| Ok::<_, Infallible>(()));
    Ok(())
}

/// Contribute a gRPC service built by `constructor`.
pub fn provide_grpc_service<S, D, F>(registry: &mut Registry, constructor: F)
where
    S: GrpcService,
    D: lifecycle::Dependencies,
    F: FnOnce(D) -> S + Send + 'static,
{
    registry.try_contribute_as(std::any::type_name::<S>(), move |deps: D| {
        Ok::<_, Infallible>(GrpcServiceEntry::new(constructor(deps)))
    });
}
