//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use gatehouse::config::ServerConfig;
use gatehouse::http::HttpServer;
use gatehouse::lifecycle::{Shutdown, ShutdownError, TaskTracker};

/// A running server on an ephemeral port.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub tasks: TaskTracker,
    pub handle: JoinHandle<Result<(), ShutdownError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a server around `routes` and give it a moment to begin accepting.
pub async fn start_server(config: ServerConfig, routes: Router) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config, routes);
    let shutdown = server.shutdown_handle();
    let tasks = server.task_tracker();
    let handle = tokio::spawn(server.run(listener));

    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        addr,
        shutdown,
        tasks,
        handle,
    }
}

/// Client with connection pooling disabled; several tests expect the server
/// to close connections on it.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
