//! Per-client rate limiting middleware.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tokio::sync::watch;

use crate::config::RateLimitConfig;
use crate::http::response;
use crate::lifecycle::ShutdownState;
use crate::observability::metrics;

/// A simple token bucket rate limiter.
///
/// Tokens are fractional and refill continuously; a full bucket admits a
/// burst of `burst` requests, and the steady-state admitted rate converges
/// to `rate` requests per second. This code runs under the registry lock and
/// must never panic.
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(burst: f64, now: Instant) -> Self {
        Self {
            tokens: burst,
            last_refill: now,
        }
    }

    fn try_acquire(&mut self, burst: f64, rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();

        self.tokens = (self.tokens + elapsed * rate).min(burst);
        if now > self.last_refill {
            self.last_refill = now;
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

struct ClientEntry {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Concurrent registry of per-client limiters.
///
/// One entry per client IP seen since the last sweep. All operations are
/// serialized by a single lock, held only for the map access plus the bucket
/// arithmetic, never across the downstream handler call.
pub struct ClientRegistry {
    clients: Mutex<HashMap<IpAddr, ClientEntry>>,
    rps: f64,
    burst: f64,
}

impl ClientRegistry {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            rps: config.rps,
            burst: config.burst as f64,
        }
    }

    /// Look up or create the limiter for `ip`, touch its last-seen time, and
    /// try to consume one token. A new client starts with a full bucket.
    pub fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut clients = self.clients.lock().expect("rate limiter mutex poisoned");
        let entry = clients.entry(ip).or_insert_with(|| ClientEntry {
            bucket: TokenBucket::new(self.burst, now),
            last_seen: now,
        });

        entry.last_seen = now;
        entry.bucket.try_acquire(self.burst, self.rps, now)
    }

    /// Remove every client idle longer than `idle_threshold`.
    ///
    /// This is the only mechanism bounding registry size; without it a server
    /// exposed to many distinct clients grows without limit.
    pub fn sweep(&self, idle_threshold: Duration) {
        self.sweep_at(idle_threshold, Instant::now());
    }

    fn sweep_at(&self, idle_threshold: Duration, now: Instant) {
        let mut clients = self.clients.lock().expect("rate limiter mutex poisoned");
        let before = clients.len();
        clients.retain(|_, entry| now.saturating_duration_since(entry.last_seen) <= idle_threshold);

        let evicted = before - clients.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = clients.len(), "evicted idle clients");
        }
    }

    /// Number of clients currently tracked.
    pub fn client_count(&self) -> usize {
        self.clients.lock().expect("rate limiter mutex poisoned").len()
    }

    /// Periodic eviction loop. Runs until the server begins draining.
    pub async fn run_sweeper(
        self: Arc<Self>,
        config: RateLimitConfig,
        mut shutdown: watch::Receiver<ShutdownState>,
    ) {
        let mut ticker = tokio::time::interval(config.sweep_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep(config.idle_threshold());
                }
                _ = shutdown.wait_for(|state| *state != ShutdownState::Running) => {
                    tracing::debug!("limiter sweeper stopping");
                    return;
                }
            }
        }
    }
}

/// Admission middleware. Outermost layer in the stack.
///
/// Resolves the client key from the connection's remote address and consults
/// the registry before the request reaches anything downstream. Installed
/// only when rate limiting is enabled; a disabled limiter never constructs a
/// registry at all.
pub async fn rate_limit_middleware(
    State(registry): State<Arc<ClientRegistry>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // The remote address is attached by `into_make_service_with_connect_info`.
    // Its absence means the transport state is malformed, which is a server
    // fault, not a client one.
    let Some(ConnectInfo(addr)) = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .copied()
    else {
        tracing::error!("remote address missing from connection info");
        return response::json_error_close(
            StatusCode::INTERNAL_SERVER_ERROR,
            "server-error",
            "internal server error",
        );
    };

    let ip = addr.ip();
    if registry.check(ip) {
        next.run(request).await
    } else {
        tracing::info!(client = %ip, "rate limit exceeded");
        metrics::record_rejection("rate_limit");
        response::json_error(
            StatusCode::TOO_MANY_REQUESTS,
            "rate-limit-error",
            "rate limit exceeded",
        )
    }
}
