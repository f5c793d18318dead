//! OS signal handling.
//!
//! SIGINT and SIGTERM both trigger the graceful drain sequence; no other
//! signals are handled.

/// Wait for a termination signal and return its name.
#[cfg(unix)]
pub async fn terminate_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt =
        signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut terminate =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
    }
}

/// Wait for a termination signal and return its name.
#[cfg(not(unix))]
pub async fn terminate_signal() -> &'static str {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    "ctrl-c"
}
