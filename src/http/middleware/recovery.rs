//! Panic recovery middleware.

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use futures_util::FutureExt;

use crate::http::response;
use crate::observability::metrics;

/// Innermost middleware layer: a recovery boundary immediately around the
/// business handlers.
///
/// A panic anywhere downstream is logged with its payload and a stack trace,
/// then answered with a generic server error carrying `Connection: close`.
/// The admission layer runs outside this boundary and must not panic.
pub async fn recovery_middleware(request: Request<Body>, next: Next) -> Response {
    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            let stack = Backtrace::force_capture();
            tracing::error!(
                panic = %panic_message(panic.as_ref()),
                stack = %stack,
                "http handler panicked"
            );
            metrics::record_panic("http_handler");
            response::json_error_close(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server-error",
                "internal server error",
            )
        }
    }
}

/// Best-effort rendering of a panic payload for logging.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
