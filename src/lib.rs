//! Admission-control and lifecycle core for small HTTP API services.
//!
//! Built with Tokio and Axum. The embedding application supplies its business
//! routes as a plain [`axum::Router`]; `gatehouse` wraps them with per-client
//! rate limiting, a panic barrier, background-task tracking, and a
//! signal-driven graceful shutdown sequence.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::{Shutdown, ShutdownError, ShutdownState, TaskTracker};
