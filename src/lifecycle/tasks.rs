//! Tracked fire-and-forget background work.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::http::middleware::recovery::panic_message;
use crate::lifecycle::shutdown::{DrainPhase, ShutdownError};
use crate::observability::metrics;

/// Launches background tasks and tracks how many are still outstanding.
///
/// Handlers use this for work that must outlive the request (and the
/// response already sent for it), while shutdown uses the count to know when
/// the process is safe to stop. Failures inside a task stay inside the task:
/// a panic is recovered and logged, never propagated.
#[derive(Clone)]
pub struct TaskTracker {
    outstanding: Arc<watch::Sender<usize>>,
}

impl TaskTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            outstanding: Arc::new(tx),
        }
    }

    /// Launch `task` on its own Tokio task.
    ///
    /// The outstanding count is incremented before spawning, so a drain
    /// check that starts after `spawn` returns always observes this task.
    /// Never blocks and never fails.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.outstanding.send_modify(|count| *count += 1);
        metrics::record_task_launched();

        let outstanding = self.outstanding.clone();
        tokio::spawn(async move {
            if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                tracing::error!(panic = %panic_message(panic.as_ref()), "background task panicked");
                metrics::record_panic("background_task");
            }
            outstanding.send_modify(|count| *count -= 1);
            metrics::record_task_completed();
        });
    }

    /// Number of tasks launched but not yet finished.
    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// Suspend until every outstanding task has finished, or until
    /// `deadline`, whichever comes first.
    pub async fn wait_idle(&self, deadline: Instant) -> Result<(), ShutdownError> {
        let mut rx = self.outstanding.subscribe();
        let result = match tokio::time::timeout_at(deadline, rx.wait_for(|count| *count == 0)).await
        {
            // The sender lives in self, so the channel cannot close under us.
            Ok(_) => Ok(()),
            Err(_) => Err(ShutdownError::DrainTimeout(DrainPhase::BackgroundTasks)),
        };
        result
    }
}

impl Default for TaskTracker {
    fn default() -> Self {
        Self::new()
    }
}
