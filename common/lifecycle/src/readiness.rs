//! Readiness probe handler.

use axum::http::StatusCode;
use tokio::sync::watch;

use crate::coordinator::Lifecycle;
use crate::state::LifecycleState;

/// Axum-compatible readiness probe; returns 200 while the coordinator is
/// running, 503 before startup completes and once shutdown has begun.
#[derive(Clone)]
pub struct ReadinessHandler {
    state: watch::Receiver<LifecycleState>,
}

impl ReadinessHandler {
    pub fn new(lifecycle: &Lifecycle) -> Self {
        Self {
            state: lifecycle.subscribe(),
        }
    }

    /// Returns OK or SERVICE_UNAVAILABLE based on the lifecycle state; no I/O.
    pub async fn check(&self) -> StatusCode {
        if *self.state.borrow() == LifecycleState::Running {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
