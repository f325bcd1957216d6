use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Router, middleware};
use shared::answers::AnswerService;
use shared::security::{Identity, ReplayGuard, TokenService};

mod ask;
mod authn;
mod errors;
mod health;
mod session;

pub const NONCE_HEADER: &str = "x-nonce";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const TOKEN_ISSUANCE_PATH: &str = "/api/auth/token";

#[derive(Clone)]
pub struct AppState {
    pub tokens: TokenService,
    pub replay_guard: Arc<ReplayGuard>,
    pub answers: AnswerService,
}

/// Identity attached to the request by the authentication gateway.
#[derive(Debug, Clone)]
pub(super) struct AuthUser {
    pub(super) identity: Identity,
}

pub fn build_router(app_state: AppState) -> Router {
    let public_routes = Router::new().route("/healthz", get(health::healthz));

    let auth_layer_state = app_state.clone();

    let gated_routes = Router::new()
        .route(TOKEN_ISSUANCE_PATH, post(session::issue_token))
        .route("/api/ask", post(ask::ask))
        .layer(middleware::from_fn_with_state(
            auth_layer_state,
            authn::auth_middleware,
        ))
        .with_state(app_state);

    public_routes.merge(gated_routes)
}
