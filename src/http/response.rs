//! Fixed responses produced by the server itself rather than by routed handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Body sent to every request refused by a closed gate.
pub const REJECTION_BODY: &str = "service is shutting down";

/// `503 Service Unavailable` with [`REJECTION_BODY`].
pub fn service_unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, REJECTION_BODY).into_response()
}
