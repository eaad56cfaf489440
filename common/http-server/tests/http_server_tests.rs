use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use http_server::{provide_http_server, HttpConfig, HttpServer, HttpServerError};
use lifecycle::{Component, HookContext, LifecycleError, Registry};
use routing::{build_router, HandlerRoute, HttpRouter, RouteEntry, RouterConfig};
use tokio::time::Instant;

struct Hello;

impl HandlerRoute for Hello {
    fn route_pattern(&self) -> &str {
        "/hello"
    }

    fn method_router(&self) -> axum::routing::MethodRouter {
        get(|| async { "world" })
    }
}

struct Slow;

impl HandlerRoute for Slow {
    fn route_pattern(&self) -> &str {
        "/slow"
    }

    fn method_router(&self) -> axum::routing::MethodRouter {
        get(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            "late"
        })
    }
}

fn http_router() -> HttpRouter {
    build_router(
        &RouterConfig::default(),
        &[
            Arc::new(RouteEntry::handler(Hello)),
            Arc::new(RouteEntry::handler(Slow)),
        ],
        None,
    )
    .unwrap()
}

fn local_config() -> HttpConfig {
    HttpConfig {
        listen_addr: "127.0.0.1:0".to_string(),
    }
}

fn deadline(millis: u64) -> HookContext {
    HookContext::with_deadline(Instant::now() + Duration::from_millis(millis))
}

#[tokio::test]
async fn serves_between_start_and_stop() {
    let mut registry = Registry::new();
    registry.supply(local_config()).unwrap();
    registry.supply(http_router()).unwrap();
    provide_http_server(&mut registry).unwrap();

    let mut container = registry.build().unwrap();
    let server = container.resolve::<HttpServer>().unwrap();
    let lifecycle = container.lifecycle();
    assert_eq!(lifecycle.len(), 1);
    assert!(server.local_addr().is_none());

    lifecycle.start(HookContext::default()).await.unwrap();
    let addr = server.local_addr().expect("bound after start");

    let body = reqwest::get(format!("http://{addr}/hello"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "world");

    tokio::time::timeout(
        Duration::from_secs(10),
        lifecycle.stop(Instant::now() + Duration::from_secs(5)),
    )
    .await
    .expect("timed out")
    .unwrap();
    assert!(server.local_addr().is_none());
    assert!(reqwest::get(format!("http://{addr}/hello")).await.is_err());
}

#[tokio::test]
async fn bind_failure_fails_start() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = HttpConfig {
        listen_addr: taken.local_addr().unwrap().to_string(),
    };

    let mut registry = Registry::new();
    registry.supply(config).unwrap();
    registry.supply(http_router()).unwrap();
    provide_http_server(&mut registry).unwrap();
    let lifecycle = registry.build().unwrap().lifecycle();

    match lifecycle.start(HookContext::default()).await {
        Err(LifecycleError::Startup { hook, source, .. }) => {
            assert_eq!(hook, "http-server");
            assert!(matches!(
                source.downcast_ref::<HttpServerError>(),
                Some(HttpServerError::Bind { .. })
            ));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn stop_aborts_requests_still_running_at_the_deadline() {
    let server = HttpServer::new(&local_config(), &http_router());
    server.start(HookContext::default()).await.unwrap();
    let addr = server.local_addr().unwrap();

    let pending = tokio::spawn(reqwest::get(format!("http://{addr}/slow")));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = tokio::time::timeout(Duration::from_secs(10), server.stop(deadline(100)))
        .await
        .expect("timed out")
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HttpServerError>(),
        Some(HttpServerError::DrainTimeout)
    ));
    pending.abort();
}

#[tokio::test]
async fn stop_without_start_is_a_no_op() {
    let server = HttpServer::new(&local_config(), &http_router());
    server.stop(deadline(100)).await.unwrap();
}

#[tokio::test]
async fn second_start_is_rejected() {
    let server = HttpServer::new(&local_config(), &http_router());
    server.start(HookContext::default()).await.unwrap();
    let err = server.start(HookContext::default()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HttpServerError>(),
        Some(HttpServerError::AlreadyStarted)
    ));
    server.stop(deadline(1000)).await.unwrap();
}

#[test]
fn config_defaults() {
    use envconfig::Envconfig;
    let config = HttpConfig::init_from_hashmap(&Default::default()).unwrap();
    assert_eq!(config.listen_addr, "0.0.0.0:8080");
}
