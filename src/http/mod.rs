//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs draining guard (reject once shutdown begins, outermost)
//!     → security::rate_limit (admission check)
//!     → request id, trace, timeout, metrics layers
//!     → middleware::recovery (panic barrier, innermost)
//!     → application handlers (supplied by the embedder)
//!     → response.rs (failure envelopes)
//! ```

pub mod middleware;
pub mod response;
pub mod server;

pub use server::HttpServer;
