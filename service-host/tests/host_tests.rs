use std::collections::HashMap;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use envconfig::Envconfig;
use http_body_util::BodyExt;
use lifecycle::{CancellationToken, ServiceOutcome};
use service_host::config::Config;
use tower::ServiceExt;

fn test_config(extra: &[(&str, &str)]) -> Config {
    let mut env: HashMap<String, String> = HashMap::from([
        ("BIND_HOST".to_string(), "127.0.0.1".to_string()),
        ("BIND_PORT".to_string(), "0".to_string()),
        ("TRAP_SIGNALS".to_string(), "false".to_string()),
        ("SERVICE_NAME".to_string(), "host-test".to_string()),
    ]);
    for (k, v) in extra {
        env.insert(k.to_string(), v.to_string());
    }
    Config::init_from_hashmap(&env).unwrap()
}

#[tokio::test]
async fn index_and_liveness_routes() {
    let app = service_host::router::router("host-test");

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"host-test\n");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/_liveness")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn host_starts_and_stops_cleanly() {
    let manager = service_host::build_manager(&test_config(&[])).unwrap();
    assert_eq!(manager.len(), 1);

    let parent = CancellationToken::new();
    let run = tokio::spawn(manager.run(parent.clone()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    parent.cancel();

    let summary = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("host did not stop")
        .unwrap();
    assert!(summary.is_clean());
    assert_eq!(summary.outcome("http"), Some(&ServiceOutcome::Stopped));
}

#[tokio::test]
async fn invalid_schedule_is_rejected_before_start() {
    let config = test_config(&[
        ("SHUTDOWN_NOTICE_MS", "5000"),
        ("SHUTDOWN_ESCALATE_MS", "1000"),
    ]);
    assert!(service_host::build_manager(&config).is_err());
}
