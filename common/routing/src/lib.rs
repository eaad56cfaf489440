//! Route aggregation: many independently constructed route providers composed
//! into one [`axum::Router`].
//!
//! Providers contribute a [`RouteEntry`] to a value group, either as a
//! [`MountRoute`] (owns a path prefix under the API prefix) or a
//! [`HandlerRoute`] (one pattern at the root). [`build_router`] checks every
//! pattern for conflicts before wiring anything, then applies the entries in
//! construction order.

mod aggregator;
mod config;
mod error;
mod registry;
mod route;

pub use aggregator::{build_router, HttpRouter};
pub use config::RouterConfig;
pub use error::RouteError;
pub use registry::RouteRegistry;
pub use route::{HandlerRoute, MountRoute, RouteEntry, RouteKind};
