//! Shutdown coordination.

use std::sync::Arc;

use tokio::sync::watch;

/// Process-wide lifecycle state. Transitions are one-directional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// Accepting and serving requests.
    Running,
    /// No longer accepting; letting in-flight and background work finish.
    Draining,
    /// Terminal.
    Stopped,
}

/// Which drain phase exceeded the shutdown deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainPhase {
    Connections,
    BackgroundTasks,
}

impl std::fmt::Display for DrainPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrainPhase::Connections => write!(f, "connection"),
            DrainPhase::BackgroundTasks => write!(f, "background task"),
        }
    }
}

/// Terminal result of the serve-and-shutdown sequence.
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    /// The listener failed for a reason unrelated to shutdown.
    #[error("listener failed: {0}")]
    Listener(#[from] std::io::Error),

    /// A drain phase did not finish before the deadline. Shutdown still
    /// completes; the overrun is the reported outcome.
    #[error("{0} drain exceeded the shutdown deadline")]
    DrainTimeout(DrainPhase),
}

/// Coordinator for graceful shutdown.
///
/// Carries the current [`ShutdownState`] on a watch channel that all
/// long-running tasks can subscribe to.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<ShutdownState>>,
}

impl Shutdown {
    /// Create a new shutdown coordinator in the `Running` state.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ShutdownState::Running);
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ShutdownState> {
        self.tx.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> ShutdownState {
        *self.tx.borrow()
    }

    /// Transition `Running → Draining`. Returns false if already past
    /// `Running`, so repeated signals collapse into one drain.
    pub fn begin_drain(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == ShutdownState::Running {
                *state = ShutdownState::Draining;
                true
            } else {
                false
            }
        })
    }

    /// Transition to the terminal `Stopped` state.
    pub fn mark_stopped(&self) {
        self.tx.send_if_modified(|state| {
            if *state == ShutdownState::Stopped {
                false
            } else {
                *state = ShutdownState::Stopped;
                true
            }
        });
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
