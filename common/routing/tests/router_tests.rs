use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::routing::{any, get, post, MethodRouter};
use axum::Router;
use http_body_util::BodyExt;
use lifecycle::{AssemblyError, Registry};
use logging::Logger;
use routing::{HandlerRoute, HttpRouter, MountRoute, RouteError, RouteRegistry, RouterConfig};
use tower::ServiceExt;

struct Greeting {
    text: &'static str,
}

struct UsersController {
    greeting: Arc<Greeting>,
}

impl MountRoute for UsersController {
    fn route_pattern(&self) -> &str {
        "/users"
    }

    fn register_routes(&self, router: Router) -> Router {
        let text = self.greeting.text;
        router
            .route("/", get(|| async { "all users" }))
            .route("/me", get(move || async move { text }))
    }
}

struct OrdersController;

impl MountRoute for OrdersController {
    fn route_pattern(&self) -> &str {
        "/orders"
    }

    fn register_routes(&self, router: Router) -> Router {
        router.route("/", post(|| async { StatusCode::CREATED }))
    }
}

struct PingHandler;

impl HandlerRoute for PingHandler {
    fn route_pattern(&self) -> &str {
        "/ping"
    }

    fn method_router(&self) -> MethodRouter {
        any(|| async { "pong" })
    }
}

struct PanicHandler;

impl HandlerRoute for PanicHandler {
    fn route_pattern(&self) -> &str {
        "/panic"
    }

    fn method_router(&self) -> MethodRouter {
        get(|| async {
            if true {
                panic!("handler blew up");
            }
            "unreachable"
        })
    }
}

fn registry(logger: Option<Logger>) -> Registry {
    let mut registry = Registry::new();
    registry.supply(RouterConfig::default()).unwrap();
    registry.supply(Greeting { text: "hello" }).unwrap();
    if let Some(logger) = logger {
        registry.supply(logger).unwrap();
    }
    registry.provide_mount(|greeting: Arc<Greeting>| UsersController { greeting });
    registry.provide_handler(|()| PingHandler);
    registry.provide_mount(|()| OrdersController);
    registry.provide_handler(|()| PanicHandler);
    registry.provide_router().unwrap();
    registry
}

fn router(registry: Registry) -> Router {
    let mut container = registry.build().unwrap();
    container.resolve::<HttpRouter>().unwrap().router()
}

async fn call(router: &Router, method: Method, uri: &str) -> (StatusCode, String) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn mounts_are_nested_under_the_api_prefix() {
    let router = router(registry(None));

    assert_eq!(
        call(&router, Method::GET, "/v1/users").await,
        (StatusCode::OK, "all users".to_string())
    );
    assert_eq!(
        call(&router, Method::GET, "/v1/users/me").await,
        (StatusCode::OK, "hello".to_string())
    );
    assert_eq!(
        call(&router, Method::POST, "/v1/orders").await.0,
        StatusCode::CREATED
    );
    assert_eq!(
        call(&router, Method::GET, "/users").await.0,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn handlers_are_wired_at_the_root_for_every_method() {
    let router = router(registry(None));

    for method in [Method::GET, Method::POST, Method::DELETE] {
        assert_eq!(
            call(&router, method, "/ping").await,
            (StatusCode::OK, "pong".to_string())
        );
    }
    assert_eq!(
        call(&router, Method::GET, "/v1/ping").await.0,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn routing_is_the_same_with_a_logger() {
    let router = router(registry(Some(Logger::console_only())));

    assert_eq!(
        call(&router, Method::GET, "/v1/users/me").await,
        (StatusCode::OK, "hello".to_string())
    );
    assert_eq!(
        call(&router, Method::PUT, "/ping").await,
        (StatusCode::OK, "pong".to_string())
    );
}

#[tokio::test]
async fn handler_panic_becomes_internal_server_error() {
    let router = router(registry(None));

    assert_eq!(
        call(&router, Method::GET, "/panic").await.0,
        StatusCode::INTERNAL_SERVER_ERROR
    );
    // The router keeps serving afterwards.
    assert_eq!(call(&router, Method::GET, "/ping").await.0, StatusCode::OK);
}

#[tokio::test]
async fn custom_api_prefix_is_applied() {
    let mut registry = Registry::new();
    registry
        .supply(RouterConfig {
            api_prefix: "/api/v2".to_string(),
        })
        .unwrap();
    registry.provide_mount(|()| OrdersController);
    registry.provide_router().unwrap();
    let router = router(registry);

    assert_eq!(
        call(&router, Method::POST, "/api/v2/orders").await.0,
        StatusCode::CREATED
    );
}

#[test]
fn conflicting_contributions_fail_at_assembly() {
    struct AnotherPing;

    impl HandlerRoute for AnotherPing {
        fn route_pattern(&self) -> &str {
            "/ping"
        }

        fn method_router(&self) -> MethodRouter {
            get(|| async { "again" })
        }
    }

    let mut registry = registry(None);
    registry.provide_handler(|()| AnotherPing);
    let mut container = registry.build().unwrap();

    match container.resolve::<HttpRouter>() {
        Err(AssemblyError::Construction { source, .. }) => {
            match source.downcast_ref::<RouteError>() {
                Some(RouteError::RouteConflict {
                    pattern,
                    first,
                    second,
                }) => {
                    assert_eq!(pattern, "/ping");
                    assert!(first.ends_with("PingHandler"));
                    assert!(second.ends_with("AnotherPing"));
                }
                other => panic!("unexpected source: {other:?}"),
            }
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn no_contributions_build_an_empty_router() {
    let mut registry = Registry::new();
    registry.supply(RouterConfig::default()).unwrap();
    registry.provide_router().unwrap();
    let router = router(registry);

    assert_eq!(
        call(&router, Method::GET, "/").await.0,
        StatusCode::NOT_FOUND
    );
}
