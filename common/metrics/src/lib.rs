use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::IntoResponse,
    routing::{get, MethodRouter},
};
use lifecycle::{AssemblyError, Registry};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use routing::{HandlerRoute, RouteRegistry};
use tracing::info;

pub const METRICS_PATH: &str = "/metrics";

const BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 50.0, 100.0, 250.0,
];

/// Install the process-wide Prometheus recorder. Fails if one is already installed.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets(BUCKETS)?
        .install_recorder()?;
    info!("prometheus recorder installed");
    Ok(handle)
}

/// Middleware to record some common HTTP metrics
/// Someday tower-http might provide a metrics middleware: https://github.com/tower-rs/tower-http/issues/57
pub async fn track_metrics(req: Request<Body>, next: Next) -> impl IntoResponse {
    let start = Instant::now();

    let path = if let Some(matched_path) = req.extensions().get::<MatchedPath>() {
        matched_path.as_str().to_owned()
    } else {
        req.uri().path().to_owned()
    };

    let method = req.method().clone();

    // Run the rest of the request handling first, so we can measure it and get response
    // codes.
    let response = next.run(req).await;

    let latency = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    let labels = [
        ("method", method.to_string()),
        ("path", path),
        ("status", status),
    ];

    metrics::counter!("http_requests_total", &labels).increment(1);
    metrics::histogram!("http_requests_duration_seconds", &labels).record(latency);

    response
}

/// `GET /metrics`, rendering the recorder behind `handle`.
pub struct PrometheusRoute {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusRoute {
    pub fn new(handle: Arc<PrometheusHandle>) -> Self {
        Self { handle }
    }
}

impl HandlerRoute for PrometheusRoute {
    fn route_pattern(&self) -> &str {
        METRICS_PATH
    }

    fn method_router(&self) -> MethodRouter {
        let handle = self.handle.clone();
        get(move || std::future::ready(handle.render()))
    }
}

/// Register the recorder as a provider and its `/metrics` route.
pub fn provide_metrics(registry: &mut Registry) -> Result<(), AssemblyError> {
    registry.try_provide(|()| setup_metrics_recorder())?;
    registry.provide_handler(|handle: Arc<PrometheusHandle>| PrometheusRoute::new(handle));
    Ok(())
}
