//! HTTP server setup and shutdown orchestration.
//!
//! # Responsibilities
//! - Wrap the application's router with the draining-guard, admission,
//!   request-id, trace, timeout, metrics, and recovery layers
//! - Serve connections and watch for termination signals
//! - Drive the drain sequence: stop accepting, wait for in-flight
//!   connections, wait for background tasks, all bounded by one deadline
//! - Report the first error encountered along the way

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    Extension, Router,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::Instant;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::http::middleware::recovery_middleware;
use crate::http::response;
use crate::observability::metrics;
use crate::lifecycle::{signals, DrainPhase, Shutdown, ShutdownError, ShutdownState, TaskTracker};
use crate::security::rate_limit::{rate_limit_middleware, ClientRegistry};

/// HTTP server wrapping an application router with the admission-control
/// and lifecycle core.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    registry: Option<Arc<ClientRegistry>>,
    tasks: TaskTracker,
    shutdown: Shutdown,
}

impl HttpServer {
    /// Create a new server around the application's routes.
    ///
    /// The client registry is only constructed when rate limiting is
    /// enabled; a disabled limiter leaves no admission layer in the stack.
    pub fn new(config: ServerConfig, routes: Router) -> Self {
        let shutdown = Shutdown::new();
        let tasks = TaskTracker::new();
        let registry = config
            .rate_limit
            .enabled
            .then(|| Arc::new(ClientRegistry::new(&config.rate_limit)));

        let router = Self::build_router(
            &config,
            routes,
            registry.clone(),
            tasks.clone(),
            shutdown.subscribe(),
        );

        Self {
            router,
            config,
            registry,
            tasks,
            shutdown,
        }
    }

    /// Wrap the application router with the middleware stack.
    ///
    /// The last layer added runs first: the draining guard sits outermost so
    /// a request refused during shutdown costs its client nothing, admission
    /// runs next, and the recovery boundary sits immediately around the
    /// business handlers.
    fn build_router(
        config: &ServerConfig,
        routes: Router,
        registry: Option<Arc<ClientRegistry>>,
        tasks: TaskTracker,
        shutdown: watch::Receiver<ShutdownState>,
    ) -> Router {
        let mut router = routes
            .layer(Extension(tasks))
            .layer(middleware::from_fn(recovery_middleware))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.listener.request_timeout_secs,
                    )))
                    .layer(middleware::from_fn(record_metrics)),
            );

        if let Some(registry) = registry {
            router = router.layer(middleware::from_fn_with_state(
                registry,
                rate_limit_middleware,
            ));
        }

        router.layer(middleware::from_fn_with_state(shutdown, draining_guard))
    }

    /// Handle for triggering the drain sequence without a signal.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// The tracker handlers receive as an [`Extension`].
    pub fn task_tracker(&self) -> TaskTracker {
        self.tasks.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serve connections on `listener` until shutdown completes.
    ///
    /// Blocks until the `Stopped` state is reached and returns the first
    /// error encountered, if any. The caller decides what a non-`Ok` outcome
    /// means for the process exit status.
    pub async fn run(self, listener: TcpListener) -> Result<(), ShutdownError> {
        let HttpServer {
            router,
            config,
            registry,
            tasks,
            shutdown,
        } = self;

        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "http server starting");

        if let Some(registry) = registry {
            tokio::spawn(registry.run_sweeper(config.rate_limit.clone(), shutdown.subscribe()));
        }

        let signal_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let signal = signals::terminate_signal().await;
            tracing::info!(signal, "shutdown signal received");
            signal_shutdown.begin_drain();
        });

        let app = router.into_make_service_with_connect_info::<SocketAddr>();
        let mut graceful = shutdown.subscribe();
        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = graceful
                    .wait_for(|state| *state != ShutdownState::Running)
                    .await;
            })
            .into_future();
        tokio::pin!(serve);

        // Biased so that observing the drain transition wins over serve
        // completing in the same poll.
        let mut draining = shutdown.subscribe();
        let serve_result = tokio::select! {
            biased;
            _ = draining.wait_for(|state| *state == ShutdownState::Draining) => None,
            result = &mut serve => Some(result),
        };

        let result = match serve_result {
            // The listener failed while still running: fatal, no drain.
            Some(Err(error)) => {
                tracing::error!(%error, "listener failed");
                Err(ShutdownError::Listener(error))
            }
            Some(Ok(())) => Ok(()),
            None => {
                tracing::info!(
                    grace_period_secs = config.shutdown.grace_period_secs,
                    "draining started"
                );
                let deadline = Instant::now() + config.shutdown.grace_period();
                drain(serve, &tasks, deadline).await
            }
        };

        shutdown.mark_stopped();
        tracing::info!("http server stopped");
        result
    }
}

/// Drive the drain sequence: in-flight connections first, then background
/// tasks, both bounded by the same `deadline`.
///
/// A deadline overrun in either phase is reported but does not stop the
/// sequence; the first error wins.
async fn drain<F>(
    serve: std::pin::Pin<&mut F>,
    tasks: &TaskTracker,
    deadline: Instant,
) -> Result<(), ShutdownError>
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    let mut first_error = None;

    match tokio::time::timeout_at(deadline, serve).await {
        Ok(Ok(())) => tracing::info!("connection drain complete"),
        Ok(Err(error)) => {
            tracing::error!(%error, "listener error during drain");
            first_error = Some(ShutdownError::Listener(error));
        }
        Err(_) => {
            let error = ShutdownError::DrainTimeout(DrainPhase::Connections);
            tracing::error!(%error, "closing remaining connections");
            first_error = Some(error);
        }
    }

    tracing::info!(outstanding = tasks.outstanding(), "waiting for background tasks");
    match tasks.wait_idle(deadline).await {
        Ok(()) => tracing::info!("background tasks drained"),
        Err(error) => {
            tracing::error!(%error, outstanding = tasks.outstanding(), "abandoning background tasks");
            if first_error.is_none() {
                first_error = Some(error);
            }
        }
    }

    match first_error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Count every response leaving the handlers by method and status.
async fn record_metrics(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16());
    response
}

/// Reject requests that race the listener close after draining has begun.
/// Runs outermost: a rejected request never reaches admission, so it does
/// not consume a token either.
async fn draining_guard(
    State(shutdown): State<watch::Receiver<ShutdownState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if *shutdown.borrow() != ShutdownState::Running {
        return response::json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "server-draining",
            "server is shutting down",
        );
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ConnectInfo;
    use axum::routing::get;
    use tower::ServiceExt;

    fn request() -> Request<Body> {
        let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
        request
    }

    #[tokio::test]
    async fn draining_guard_rejects_once_drain_begins() {
        let shutdown = Shutdown::new();
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(
                shutdown.subscribe(),
                draining_guard,
            ));

        let response = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        shutdown.begin_drain();
        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error_code"], "server-draining");
    }

    #[tokio::test]
    async fn drain_rejection_does_not_touch_the_registry() {
        let config = ServerConfig::default();
        let shutdown = Shutdown::new();
        let registry = Arc::new(ClientRegistry::new(&config.rate_limit));

        // Same ordering as build_router: guard outside admission.
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(
                registry.clone(),
                rate_limit_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                shutdown.subscribe(),
                draining_guard,
            ));

        shutdown.begin_drain();
        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        // The refused request was never charged a token.
        assert_eq!(registry.client_count(), 0);
    }
}
