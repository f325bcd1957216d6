use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use shared::models::{AskRequest, AskResponse};
use shared::validation::{validate_ask_username, validate_question};
use tracing::warn;

use super::errors::{bad_request_response, forbidden_response, invalid_body_response};
use super::{AppState, AuthUser};

#[derive(Debug, Deserialize)]
pub(super) struct AskQuery {
    username: Option<String>,
}

pub(super) async fn ask(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    query: Result<Query<AskQuery>, QueryRejection>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid_body_response(rejection),
    };

    // An unparseable query string counts as a missing username.
    let requested = query.ok().and_then(|Query(query)| query.username);

    if let Err(err) = validate_question(&req.question) {
        return bad_request_response(err.to_string());
    }

    let username = match validate_ask_username(requested.as_deref()) {
        Ok(username) => username,
        Err(err) => return bad_request_response(err.to_string()),
    };

    if username != auth.identity.as_str() {
        warn!(
            requested = username,
            authenticated = %auth.identity,
            "ask username does not match authenticated identity"
        );
        return forbidden_response("Username in request does not match authenticated user");
    }

    let answer = state.answers.answer(username, &req.question).await;
    (StatusCode::OK, Json(AskResponse { answer })).into_response()
}
