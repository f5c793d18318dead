//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-IP admission check)
//!     → Pass to the wrapped application
//! ```
//!
//! # Design Decisions
//! - Admission runs outermost: rejected requests never touch handlers
//! - One lock for the whole registry; critical sections stay bounded
//! - Fail closed on malformed transport state

pub mod rate_limit;

pub use rate_limit::ClientRegistry;
