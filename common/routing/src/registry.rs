use std::any::type_name;
use std::convert::Infallible;
use std::sync::Arc;

use lifecycle::{AssemblyError, BoxError, Dependencies, Group, Registry};
use logging::Logger;

use crate::aggregator::{build_router, HttpRouter};
use crate::config::RouterConfig;
use crate::route::{HandlerRoute, MountRoute, RouteEntry};

/// Route registration on top of [`Registry`]: each helper adapts a
/// constructor of a concrete mount or handler into a [`RouteEntry`] group
/// contribution, so route providers are built in construction order like any
/// other dependency.
pub trait RouteRegistry {
    fn provide_mount<M, D, F>(&mut self, constructor: F)
    where
        M: MountRoute,
        D: Dependencies,
        F: FnOnce(D) -> M + Send + 'static;

    fn try_provide_mount<M, D, E, F>(&mut self, constructor: F)
    where
        M: MountRoute,
        D: Dependencies,
        E: Into<BoxError>,
        F: FnOnce(D) -> Result<M, E> + Send + 'static;

    fn provide_handler<H, D, F>(&mut self, constructor: F)
    where
        H: HandlerRoute,
        D: Dependencies,
        F: FnOnce(D) -> H + Send + 'static;

    fn try_provide_handler<H, D, E, F>(&mut self, constructor: F)
    where
        H: HandlerRoute,
        D: Dependencies,
        E: Into<BoxError>,
        F: FnOnce(D) -> Result<H, E> + Send + 'static;

    /// Register the aggregator itself: an [`HttpRouter`] built from the
    /// supplied [`RouterConfig`], every [`RouteEntry`] and, if present, the
    /// [`Logger`].
    fn provide_router(&mut self) -> Result<(), AssemblyError>;
}

impl RouteRegistry for Registry {
    fn provide_mount<M, D, F>(&mut self, constructor: F)
    where
        M: MountRoute,
        D: Dependencies,
        F: FnOnce(D) -> M + Send + 'static,
    {
        self.try_provide_mount(move |deps: D| Ok::<_, Infallible>(constructor(deps)));
    }

    fn try_provide_mount<M, D, E, F>(&mut self, constructor: F)
    where
        M: MountRoute,
        D: Dependencies,
        E: Into<BoxError>,
        F: FnOnce(D) -> Result<M, E> + Send + 'static,
    {
        self.try_contribute_as(type_name::<M>(), move |deps: D| {
            constructor(deps).map(RouteEntry::mount)
        });
    }

    fn provide_handler<H, D, F>(&mut self, constructor: F)
    where
        H: HandlerRoute,
        D: Dependencies,
        F: FnOnce(D) -> H + Send + 'static,
    {
        self.try_provide_handler(move |deps: D| Ok::<_, Infallible>(constructor(deps)));
    }

    fn try_provide_handler<H, D, E, F>(&mut self, constructor: F)
    where
        H: HandlerRoute,
        D: Dependencies,
        E: Into<BoxError>,
        F: FnOnce(D) -> Result<H, E> + Send + 'static,
    {
        self.try_contribute_as(type_name::<H>(), move |deps: D| {
            constructor(deps).map(RouteEntry::handler)
        });
    }

    fn provide_router(&mut self) -> Result<(), AssemblyError> {
        self.try_provide(
            |(config, routes, logger): (
                Arc<RouterConfig>,
                Group<RouteEntry>,
                Option<Arc<Logger>>,
            )| build_router(&config, &routes.into_vec(), logger.as_deref()),
        )
    }
}
