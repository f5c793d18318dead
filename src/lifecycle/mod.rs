//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → Shutdown::begin_drain
//!
//! Shutdown (shutdown.rs):
//!     Running → Draining (stop accepting, drain in-flight)
//!             → Stopped  (background work drained or deadline hit)
//!
//! Tasks (tasks.rs):
//!     Handler spawns work → counted while running → drained at shutdown
//! ```
//!
//! # Design Decisions
//! - State transitions are one-directional and process-wide
//! - Drain is best-effort: deadline overruns are reported, never retried
//! - Background tasks are waited for, not interrupted

pub mod shutdown;
pub mod signals;
pub mod tasks;

pub use shutdown::{DrainPhase, Shutdown, ShutdownError, ShutdownState};
pub use tasks::TaskTracker;
