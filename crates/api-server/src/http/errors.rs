use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::models::ErrorResponse;
use tracing::warn;

pub(super) const MISSING_HEADERS_MESSAGE: &str =
    "Missing required security headers (X-Nonce, X-Timestamp)";
pub(super) const INVALID_TIMESTAMP_MESSAGE: &str = "Invalid timestamp format";
pub(super) const UNAUTHENTICATED_MESSAGE: &str = "Unauthorized: JWT authentication failed";
pub(super) const REPLAY_MESSAGE: &str = "Invalid request: Possible replay attack detected";
pub(super) const INVALID_BODY_MESSAGE: &str = "Request body must be a JSON object";

pub(super) fn unauthorized_response(message: &str) -> Response {
    error_response(StatusCode::UNAUTHORIZED, message)
}

pub(super) fn bad_request_response(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, message)
}

/// Unreadable, mistyped or non-JSON bodies all get the same 400.
pub(super) fn invalid_body_response(rejection: JsonRejection) -> Response {
    warn!(
        status = rejection.status().as_u16(),
        reason = %rejection.body_text(),
        "rejected request body"
    );
    bad_request_response(INVALID_BODY_MESSAGE)
}

pub(super) fn forbidden_response(message: &str) -> Response {
    error_response(StatusCode::FORBIDDEN, message)
}

pub(super) fn internal_error_response() -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "An unexpected error occurred",
    )
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(message))).into_response()
}
