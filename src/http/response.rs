//! JSON failure envelopes.
//!
//! Every machine-readable failure body has the same shape:
//! `{"ok": false, "error": <message>, "error_code": <code>}`.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Build a failure response with the standard envelope.
pub fn json_error(status: StatusCode, code: &str, message: &str) -> Response {
    let body = json!({
        "ok": false,
        "error": message,
        "error_code": code,
    });
    (status, Json(body)).into_response()
}

/// Failure envelope plus `Connection: close`, for responses produced when
/// the connection may be in an inconsistent state.
pub fn json_error_close(status: StatusCode, code: &str, message: &str) -> Response {
    let mut response = json_error(status, code, message);
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
