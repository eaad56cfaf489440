use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use common_metrics::{setup_metrics_recorder, track_metrics, PrometheusRoute, METRICS_PATH};
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use routing::HandlerRoute;
use tower::ServiceExt;

async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn metrics_route_renders_the_recorder() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = Arc::new(recorder.handle());
    metrics::with_local_recorder(&recorder, || {
        metrics::counter!("lifecycle_hook_start_total", "hook" => "db", "result" => "ok")
            .increment(1);
    });

    let route = PrometheusRoute::new(handle);
    assert_eq!(route.route_pattern(), METRICS_PATH);
    let router = Router::new().route(route.route_pattern(), route.method_router());

    let (status, body) = get_body(router, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("lifecycle_hook_start_total"), "body: {body}");
}

/// Installs the global recorder, so it is the only test in this binary that
/// does.
#[tokio::test]
async fn track_metrics_records_requests_under_the_global_recorder() {
    let handle = setup_metrics_recorder().unwrap();
    assert!(
        setup_metrics_recorder().is_err(),
        "a second recorder cannot be installed"
    );

    let router = Router::new()
        .route("/users/:id", get(|| async { "user" }))
        .layer(axum::middleware::from_fn(track_metrics));
    let (status, _) = get_body(router, "/users/42").await;
    assert_eq!(status, StatusCode::OK);

    let rendered = handle.render();
    assert!(rendered.contains("http_requests_total"), "rendered: {rendered}");
    assert!(rendered.contains("path=\"/users/:id\""), "rendered: {rendered}");
    assert!(rendered.contains("http_requests_duration_seconds"));
}
