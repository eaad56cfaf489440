//! Routes owned by the process itself: probes and the lifecycle status mount.

use std::sync::Arc;

use axum::routing::{get, MethodRouter};
use axum::{Json, Router};
use lifecycle::{Lifecycle, LivenessHandler, ReadinessHandler};
use routing::{HandlerRoute, MountRoute};
use serde_json::json;

/// `GET /_readiness`: 200 while running, 503 otherwise.
pub struct ReadinessRoute {
    readiness: ReadinessHandler,
}

impl ReadinessRoute {
    pub fn new(lifecycle: &Lifecycle) -> Self {
        Self {
            readiness: ReadinessHandler::new(lifecycle),
        }
    }
}

impl HandlerRoute for ReadinessRoute {
    fn route_pattern(&self) -> &str {
        "/_readiness"
    }

    fn method_router(&self) -> MethodRouter {
        let readiness = self.readiness.clone();
        get(move || async move { readiness.check().await })
    }
}

/// `GET /_liveness`: always 200.
pub struct LivenessRoute;

impl HandlerRoute for LivenessRoute {
    fn route_pattern(&self) -> &str {
        "/_liveness"
    }

    fn method_router(&self) -> MethodRouter {
        let liveness = LivenessHandler::new();
        get(move || async move { liveness.check() })
    }
}

/// `GET <api prefix>/status`: lifecycle state and hook count.
pub struct StatusController {
    lifecycle: Arc<Lifecycle>,
}

impl StatusController {
    pub fn new(lifecycle: Arc<Lifecycle>) -> Self {
        Self { lifecycle }
    }
}

impl MountRoute for StatusController {
    fn route_pattern(&self) -> &str {
        "/status"
    }

    fn register_routes(&self, router: Router) -> Router {
        let lifecycle = self.lifecycle.clone();
        router.route(
            "/",
            get(move || async move {
                Json(json!({
                    "state": lifecycle.state().to_string(),
                    "hooks": lifecycle.len(),
                }))
            }),
        )
    }
}
