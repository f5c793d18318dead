//! Graceful-shutdown integration tests.

use std::time::{Duration, Instant};

use axum::{routing::get, Extension, Router};
use reqwest::StatusCode;

use gatehouse::config::ServerConfig;
use gatehouse::lifecycle::{DrainPhase, ShutdownError, TaskTracker};

mod common;

fn quiet_config(grace_secs: u64) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.rate_limit.enabled = false;
    config.shutdown.grace_period_secs = grace_secs;
    config
}

#[tokio::test]
async fn drain_with_no_work_returns_ok() {
    let server = common::start_server(quiet_config(5), Router::new()).await;

    server.shutdown.begin_drain();
    let result = server.handle.await.unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn shutdown_waits_for_background_work() {
    let routes = Router::new().route(
        "/enqueue",
        get(|Extension(tasks): Extension<TaskTracker>| async move {
            tasks.spawn(async {
                tokio::time::sleep(Duration::from_millis(400)).await;
            });
            "accepted"
        }),
    );

    let server = common::start_server(quiet_config(5), routes).await;
    let client = common::client();

    let res = client.get(server.url("/enqueue")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(server.tasks.outstanding(), 1);

    let started = Instant::now();
    server.shutdown.begin_drain();
    let result = server.handle.await.unwrap();

    assert!(result.is_ok());
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(server.tasks.outstanding(), 0);
}

#[tokio::test]
async fn shutdown_reports_timeout_on_stuck_task() {
    let server = common::start_server(quiet_config(1), Router::new()).await;

    server.tasks.spawn(async {
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let started = Instant::now();
    server.shutdown.begin_drain();
    let result = server.handle.await.unwrap();

    assert!(matches!(
        result,
        Err(ShutdownError::DrainTimeout(DrainPhase::BackgroundTasks))
    ));
    // Reached Stopped shortly after the deadline, not blocked indefinitely.
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn repeated_drain_triggers_are_harmless() {
    let server = common::start_server(quiet_config(5), Router::new()).await;

    assert!(server.shutdown.begin_drain());
    assert!(!server.shutdown.begin_drain());
    assert!(!server.shutdown.begin_drain());

    let result = server.handle.await.unwrap();
    assert!(result.is_ok());
}
