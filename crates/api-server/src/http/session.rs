use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::models::{AuthRequest, AuthResponse};
use shared::validation::validate_token_username;
use tracing::{error, info};

use super::AppState;
use super::errors::{bad_request_response, internal_error_response, invalid_body_response};

pub(super) async fn issue_token(
    State(state): State<AppState>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid_body_response(rejection),
    };

    if let Err(err) = validate_token_username(&req.username) {
        return bad_request_response(err.to_string());
    }

    match state.tokens.issue(&req.username) {
        Ok(token) => {
            info!(username = %req.username, "issued access token");
            (StatusCode::OK, Json(AuthResponse { token })).into_response()
        }
        Err(err) => {
            error!(error = %err, "failed to issue access token");
            internal_error_response()
        }
    }
}
