use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, header};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use shared::security::{TokenIdentity, Verdict, nonce_fingerprint};
use tracing::{debug, warn};

use super::errors::{
    INVALID_TIMESTAMP_MESSAGE, MISSING_HEADERS_MESSAGE, REPLAY_MESSAGE, UNAUTHENTICATED_MESSAGE,
    unauthorized_response,
};
use super::{AppState, AuthUser, NONCE_HEADER, TIMESTAMP_HEADER, TOKEN_ISSUANCE_PATH};

/// Authentication gateway for every `/api` route.
///
/// Token issuance is forwarded untouched. Everything else must carry the
/// nonce and timestamp headers plus a valid bearer token, and must be
/// admitted by the replay guard before the handler runs. All rejections
/// share status 401; only the log line records which check failed.
pub(super) async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    if is_token_issuance(&req) {
        return next.run(req).await;
    }

    let headers = req.headers();
    let (Some(nonce_header), Some(timestamp_header)) =
        (headers.get(NONCE_HEADER), headers.get(TIMESTAMP_HEADER))
    else {
        warn!(path = %req.uri().path(), "missing nonce or timestamp header");
        return unauthorized_response(MISSING_HEADERS_MESSAGE);
    };

    let Some(client_timestamp_ms) = timestamp_header.to_str().ok().and_then(parse_timestamp)
    else {
        warn!(path = %req.uri().path(), "malformed timestamp header");
        return unauthorized_response(INVALID_TIMESTAMP_MESSAGE);
    };

    let encrypted_nonce = nonce_header.to_str().unwrap_or_default().to_string();
    let token = bearer_token(headers).map(str::to_string);

    let identity = match token.as_deref().map(|token| state.tokens.identify(token)) {
        Some(TokenIdentity::Identity(identity)) => Some(identity),
        Some(TokenIdentity::NoIdentity(reason)) => {
            warn!(error = %reason, "could not extract identity from bearer token");
            None
        }
        None => None,
    };

    let (Some(identity), Some(token)) = (identity, token) else {
        warn!(path = %req.uri().path(), "request carries no usable bearer token");
        return unauthorized_response(UNAUTHENTICATED_MESSAGE);
    };

    if req.extensions().get::<AuthUser>().is_some() {
        warn!(identity = %identity, "request already carries an authenticated identity");
        return unauthorized_response(UNAUTHENTICATED_MESSAGE);
    }

    if !state.tokens.validate(&token) {
        warn!(identity = %identity, "bearer token failed validation");
        return unauthorized_response(UNAUTHENTICATED_MESSAGE);
    }

    let now_ms = Utc::now().timestamp_millis();
    match state
        .replay_guard
        .admit(&identity, &encrypted_nonce, client_timestamp_ms, now_ms)
    {
        Verdict::Accept => {}
        Verdict::Reject(reason) => {
            warn!(
                identity = %identity,
                reason = reason.as_str(),
                nonce = %nonce_fingerprint(&encrypted_nonce),
                client_timestamp_ms,
                "replay guard rejected request"
            );
            return unauthorized_response(REPLAY_MESSAGE);
        }
    }

    debug!(identity = %identity, "request authenticated");
    req.extensions_mut().insert(AuthUser { identity });
    next.run(req).await
}

fn is_token_issuance(req: &Request) -> bool {
    req.method() == Method::POST && req.uri().path() == TOKEN_ISSUANCE_PATH
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn parse_timestamp(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok()
}
