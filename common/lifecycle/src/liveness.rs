//! Liveness probe handler.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Liveness probe. Always returns 200: liveness means "the process is
/// reachable", shutdown progress is reported through readiness instead.
#[derive(Clone, Default)]
pub struct LivenessHandler;

impl LivenessHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self) -> LivenessStatus {
        LivenessStatus
    }
}

/// Always-healthy liveness status. Implements [`IntoResponse`] for axum.
pub struct LivenessStatus;

impl IntoResponse for LivenessStatus {
    fn into_response(self) -> Response {
        (StatusCode::OK, "ok").into_response()
    }
}
