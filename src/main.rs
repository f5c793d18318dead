//! Demo server wiring the admission-control and lifecycle core around a
//! minimal set of application routes.

use std::path::PathBuf;

use axum::{response::IntoResponse, routing::get, Json, Router};
use clap::Parser;
use serde_json::json;
use tokio::net::TcpListener;

use gatehouse::config::{self, ServerConfig};
use gatehouse::http::HttpServer;
use gatehouse::observability;

#[derive(Parser)]
#[command(name = "gatehouse", version, about = "HTTP API server core")]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => ServerConfig::default(),
    };

    observability::logging::init(&config.observability);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit_enabled = config.rate_limit.enabled,
        rps = config.rate_limit.rps,
        burst = config.rate_limit.burst,
        grace_period_secs = config.shutdown.grace_period_secs,
        "configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_exporter(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let server = HttpServer::new(config, routes());
    // A non-Ok outcome propagates out of main as a non-zero exit status.
    server.run(listener).await?;

    tracing::info!("shutdown complete");
    Ok(())
}

fn routes() -> Router {
    Router::new().route("/api/v1/health", get(health_handler))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "ok": true,
        "status": "available",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
