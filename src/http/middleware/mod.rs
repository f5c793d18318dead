//! Middleware layers owned by the core.

pub mod recovery;

pub use recovery::recovery_middleware;
