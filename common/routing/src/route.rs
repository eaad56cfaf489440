use std::fmt;
use std::sync::Arc;

use axum::routing::MethodRouter;
use axum::Router;

/// A provider owning every path beneath its prefix.
pub trait MountRoute: Send + Sync + 'static {
    /// Prefix relative to the API prefix, e.g. `/users`.
    fn route_pattern(&self) -> &str;

    /// Add this mount's routes to a fresh router nested under the prefix.
    fn register_routes(&self, router: Router) -> Router;
}

/// A provider serving one exact pattern at the root.
pub trait HandlerRoute: Send + Sync + 'static {
    fn route_pattern(&self) -> &str;

    /// Wired as returned; use [`axum::routing::any`] to accept every method.
    fn method_router(&self) -> MethodRouter;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteKind {
    Mount,
    Handler,
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteKind::Mount => f.write_str("mount"),
            RouteKind::Handler => f.write_str("handler"),
        }
    }
}

#[derive(Clone)]
pub(crate) enum Route {
    Mount(Arc<dyn MountRoute>),
    Handler(Arc<dyn HandlerRoute>),
}

/// Member of the route value group: a route provider and the type that owns it.
#[derive(Clone)]
pub struct RouteEntry {
    pub(crate) owner: &'static str,
    pub(crate) route: Route,
}

impl RouteEntry {
    pub fn mount<M: MountRoute>(mount: M) -> Self {
        Self {
            owner: std::any::type_name::<M>(),
            route: Route::Mount(Arc::new(mount)),
        }
    }

    pub fn handler<H: HandlerRoute>(handler: H) -> Self {
        Self {
            owner: std::any::type_name::<H>(),
            route: Route::Handler(Arc::new(handler)),
        }
    }

    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub fn kind(&self) -> RouteKind {
        match self.route {
            Route::Mount(_) => RouteKind::Mount,
            Route::Handler(_) => RouteKind::Handler,
        }
    }

    pub fn pattern(&self) -> &str {
        match &self.route {
            Route::Mount(mount) => mount.route_pattern(),
            Route::Handler(handler) => handler.route_pattern(),
        }
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("owner", &self.owner)
            .field("kind", &self.kind())
            .field("pattern", &self.pattern())
            .finish()
    }
}
