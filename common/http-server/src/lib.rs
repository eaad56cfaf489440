//! HTTP listener component: serves the aggregated [`HttpRouter`] from a
//! background task bound to the lifecycle's start/stop hooks.
//!
//! Start binds the listener (a bind failure is a start failure) and returns
//! as soon as the socket is open; stop stops accepting, lets in-flight
//! requests finish until the stop deadline, then aborts what is left.

mod config;
mod error;
mod server;

use std::convert::Infallible;
use std::sync::Arc;

use lifecycle::{AssemblyError, Registry};
use routing::HttpRouter;

pub use config::HttpConfig;
pub use error::HttpServerError;
pub use server::HttpServer;

/// Register the [`HttpServer`] component and make sure it gets built.
pub fn provide_http_server(registry: &mut Registry) -> Result<(), AssemblyError> {
    registry.provide_component(|(config, router): (Arc<HttpConfig>, Arc<HttpRouter>)| {
        HttpServer::new(&config, &router)
    })?;
    registry.invoke(|_: Arc<HttpServer>| Ok::<_, Infallible>(()));
    Ok(())
}
