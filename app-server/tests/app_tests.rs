use std::collections::HashMap;
use std::time::Duration;

use app_server::app::assemble;
use app_server::config::Config;
use build_info::BuildInfo;
use envconfig::Envconfig;
use http_server::HttpServer;
use lifecycle::{ExitStatus, LifecycleState, Supervisor};
use logging::Logger;
use tokio::sync::mpsc;

fn test_config() -> Config {
    let env = HashMap::from([
        ("HTTP_LISTEN_ADDR".to_string(), "127.0.0.1:0".to_string()),
        ("METRICS_ENABLED".to_string(), "false".to_string()),
        ("LOG_FILE_ENABLED".to_string(), "false".to_string()),
    ]);
    Config::init_from_hashmap(&env).unwrap()
}

#[test]
fn assembly_appends_hooks_in_construction_order() {
    let container = assemble(
        &test_config(),
        Logger::console_only(),
        BuildInfo::new("0.0.0-test"),
    )
    .unwrap();

    // build-info banner, then the HTTP server.
    assert_eq!(container.lifecycle().len(), 2);
    let order = container.construction_order();
    let router = order
        .iter()
        .position(|label| label.ends_with("HttpRouter"))
        .unwrap();
    let server = order
        .iter()
        .position(|label| label.ends_with("HttpServer"))
        .unwrap();
    assert!(router < server);
}

#[test]
fn invalid_api_prefix_fails_assembly() {
    let mut config = test_config();
    config.router.api_prefix = "v1".to_string();

    let err = assemble(&config, Logger::console_only(), BuildInfo::new("0.0.0-test"))
        .err()
        .expect("assembly should fail");
    assert!(err.to_string().contains("HttpRouter"), "error: {err}");
}

#[tokio::test]
async fn serves_until_terminated() {
    let mut container = assemble(
        &test_config(),
        Logger::console_only(),
        BuildInfo::new("0.0.0-test"),
    )
    .unwrap();
    let server = container.resolve::<HttpServer>().unwrap();
    let lifecycle = container.lifecycle();

    let (tx, rx) = mpsc::channel(2);
    let run = tokio::spawn(Supervisor::new(lifecycle.clone(), rx).run());

    let mut state = lifecycle.subscribe();
    tokio::time::timeout(
        Duration::from_secs(10),
        state.wait_for(|s| *s == LifecycleState::Running),
    )
    .await
    .expect("timed out")
    .unwrap();
    let addr = server.local_addr().expect("listening while running");
    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap();

    let readiness = client
        .get(format!("http://{addr}/_readiness"))
        .send()
        .await
        .unwrap();
    assert_eq!(readiness.status(), reqwest::StatusCode::OK);

    let liveness = client
        .get(format!("http://{addr}/_liveness"))
        .send()
        .await
        .unwrap();
    assert_eq!(liveness.status(), reqwest::StatusCode::OK);
    assert_eq!(liveness.text().await.unwrap(), "ok");

    let status: serde_json::Value = client
        .get(format!("http://{addr}/v1/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["state"], "running");
    assert_eq!(status["hooks"], 2);

    let info: serde_json::Value = client
        .get(format!("http://{addr}/_info"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["version"], "0.0.0-test");

    tx.send("SIGTERM".to_string()).await.unwrap();
    let exit = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("timed out")
        .unwrap();
    assert_eq!(exit, ExitStatus::Clean);
    assert_eq!(lifecycle.state(), LifecycleState::Stopped);
}
