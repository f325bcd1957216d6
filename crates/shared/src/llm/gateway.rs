use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

pub type LlmGatewayFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, LlmGatewayError>> + Send + 'a>>;

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system_prompt: String,
    pub question: String,
}

#[derive(Debug, Error)]
pub enum LlmGatewayError {
    #[error("llm provider request timed out")]
    Timeout,
    #[error("llm provider request failed: {0}")]
    ProviderFailure(String),
    #[error("llm provider returned an invalid payload: {0}")]
    InvalidProviderPayload(String),
}

/// Produces answer text for a system prompt and a user question.
pub trait LlmGateway: Send + Sync {
    fn complete<'a>(&'a self, request: LlmRequest) -> LlmGatewayFuture<'a>;
}
