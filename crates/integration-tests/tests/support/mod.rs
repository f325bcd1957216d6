#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use api_server::http::{AppState, NONCE_HEADER, TIMESTAMP_HEADER, build_router};
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{Value, json};
use shared::answer_cache::AnswerCache;
use shared::answers::AnswerService;
use shared::chat_log::ChatLog;
use shared::faq::FaqCatalog;
use shared::llm::{LlmGateway, LlmGatewayFuture, LlmRequest};
use shared::models::Faq;
use shared::security::{NonceCipher, ReplayGuard, ReplayPolicy, TokenClaims, TokenService};
use tempfile::TempDir;
use tower::ServiceExt;

pub const NONCE_KEY: &[u8] = b"integration-key!";
pub const JWT_SECRET: &str = "integration-jwt-secret";
pub const STUB_ANSWER: &str = "Do your duty without attachment to the fruits.";

/// Replay policy without the per-identity interval, so one user can send
/// several requests in quick succession.
pub fn unthrottled_policy() -> ReplayPolicy {
    ReplayPolicy {
        min_interval_ms: 0,
        ..ReplayPolicy::default()
    }
}

pub struct StubGateway {
    calls: AtomicUsize,
}

impl StubGateway {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmGateway for StubGateway {
    fn complete<'a>(&'a self, _request: LlmRequest) -> LlmGatewayFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(STUB_ANSWER.to_string())
        })
    }
}

pub struct TestApp {
    pub router: axum::Router,
    pub replay_guard: Arc<ReplayGuard>,
    pub tokens: TokenService,
    pub gateway: Arc<StubGateway>,
    pub chat_log_dir: TempDir,
    cipher: NonceCipher,
}

pub fn build_test_app(policy: ReplayPolicy) -> TestApp {
    let chat_log_dir = tempfile::tempdir().expect("temp dir should create");
    let gateway = Arc::new(StubGateway {
        calls: AtomicUsize::new(0),
    });
    let replay_guard = Arc::new(ReplayGuard::new(
        NonceCipher::new(NONCE_KEY).expect("nonce key should be valid"),
        policy,
    ));
    let tokens = TokenService::new(JWT_SECRET.as_bytes(), 3_600);
    let faqs = FaqCatalog::new(vec![Faq {
        question: "What is the Bhagavad Gita?".to_string(),
        answer: None,
    }]);

    let router = build_router(AppState {
        tokens: tokens.clone(),
        replay_guard: replay_guard.clone(),
        answers: AnswerService::new(
            faqs,
            gateway.clone(),
            AnswerCache::new(50),
            ChatLog::new(chat_log_dir.path()).expect("chat log should initialize"),
        ),
    });

    TestApp {
        router,
        replay_guard,
        tokens,
        gateway,
        chat_log_dir,
        cipher: NonceCipher::new(NONCE_KEY).expect("nonce key should be valid"),
    }
}

impl TestApp {
    pub fn token_for(&self, username: &str) -> String {
        self.tokens
            .issue(username)
            .expect("token issuance should succeed")
    }

    /// Encrypts a random nonce under the shared key with a random IV.
    pub fn fresh_nonce(&self) -> String {
        let plaintext = format!("{:032x}", rand::random::<u128>());
        self.cipher.encrypt(&plaintext, rand::random::<[u8; 16]>())
    }

    pub fn chat_log_files(&self) -> usize {
        std::fs::read_dir(self.chat_log_dir.path())
            .expect("chat log dir should be readable")
            .count()
    }

    pub async fn send(&self, request: Request<Body>) -> JsonResponse {
        send_json(&self.router, request).await
    }
}

pub fn expired_token_for(username: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = TokenClaims {
        sub: username.to_string(),
        iat: now - 7_200,
        exp: now - 3_600,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("expired token should encode")
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Debug)]
pub struct JsonResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl JsonResponse {
    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }
}

pub async fn send_json(app: &axum::Router, request: Request<Body>) -> JsonResponse {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("request should succeed");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should read");
    let body = serde_json::from_slice::<Value>(&body).unwrap_or_else(|_| json!({}));

    JsonResponse { status, body }
}

/// Headers a client attaches to every gated request.
#[derive(Debug, Default, Clone)]
pub struct SecurityHeaders {
    pub bearer: Option<String>,
    pub nonce: Option<String>,
    pub timestamp: Option<String>,
}

impl SecurityHeaders {
    pub fn new(token: &str, nonce: &str, timestamp_ms: i64) -> Self {
        Self {
            bearer: Some(token.to_string()),
            nonce: Some(nonce.to_string()),
            timestamp: Some(timestamp_ms.to_string()),
        }
    }
}

pub fn request(
    method: Method,
    uri: &str,
    headers: &SecurityHeaders,
    json_body: Option<Value>,
) -> Request<Body> {
    match json_body {
        Some(body) => raw_request(
            method,
            uri,
            headers,
            Some("application/json"),
            body.to_string(),
        ),
        None => raw_request(method, uri, headers, None, String::new()),
    }
}

/// Request with an arbitrary body and optional content type.
pub fn raw_request(
    method: Method,
    uri: &str,
    headers: &SecurityHeaders,
    content_type: Option<&str>,
    body: String,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = &headers.bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    if let Some(nonce) = &headers.nonce {
        builder = builder.header(NONCE_HEADER, nonce);
    }
    if let Some(timestamp) = &headers.timestamp {
        builder = builder.header(TIMESTAMP_HEADER, timestamp);
    }
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }

    builder.body(Body::from(body)).expect("request should build")
}

pub fn ask_request(username: &str, question: &str, headers: &SecurityHeaders) -> Request<Body> {
    request(
        Method::POST,
        &format!("/api/ask?username={username}"),
        headers,
        Some(json!({ "question": question })),
    )
}
