use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

use super::gateway::{LlmGateway, LlmGatewayError, LlmGatewayFuture, LlmRequest};

const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u32 = 500;

#[derive(Debug, Clone)]
pub struct OpenAiGatewayConfig {
    pub chat_completions_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_backoff_ms: u64,
}

#[derive(Debug, Error)]
pub enum OpenAiConfigError {
    #[error("failed to build OpenAI http client: {0}")]
    HttpClient(String),
}

#[derive(Clone)]
pub struct OpenAiGateway {
    client: reqwest::Client,
    config: OpenAiGatewayConfig,
}

impl OpenAiGateway {
    pub fn new(config: OpenAiGatewayConfig) -> Result<Self, OpenAiConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| OpenAiConfigError::HttpClient(err.to_string()))?;

        Ok(Self { client, config })
    }

    async fn send_once(&self, request: &LlmRequest) -> Result<String, AttemptError> {
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.question,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(&self.config.chat_completions_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                AttemptError::Transient(if err.is_timeout() {
                    LlmGatewayError::Timeout
                } else {
                    LlmGatewayError::ProviderFailure("request_unavailable".to_string())
                })
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|_| AttemptError::invalid_payload("response_body_read_failed"))?;

        if !status.is_success() {
            let error = LlmGatewayError::ProviderFailure(format!(
                "status={} code={}",
                status.as_u16(),
                provider_error_code(&text)
            ));
            return Err(if is_retryable_status(status) {
                AttemptError::Transient(error)
            } else {
                AttemptError::Fatal(error)
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|_| AttemptError::invalid_payload("response_json_parse_failed"))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| AttemptError::invalid_payload("missing_choice"))
    }
}

impl LlmGateway for OpenAiGateway {
    fn complete<'a>(&'a self, request: LlmRequest) -> LlmGatewayFuture<'a> {
        Box::pin(async move {
            let mut attempt = 0_u32;
            loop {
                let error = match self.send_once(&request).await {
                    Ok(content) => return Ok(content),
                    Err(AttemptError::Fatal(error)) => return Err(error),
                    Err(AttemptError::Transient(error)) => error,
                };
                if attempt >= self.config.max_retries {
                    return Err(error);
                }

                let delay = retry_delay(self.config.retry_base_backoff_ms, attempt);
                warn!(attempt, ?delay, error = %error, "retrying openai request");
                sleep(delay).await;
                attempt += 1;
            }
        })
    }
}

/// Outcome of a single provider call that did not produce an answer.
#[derive(Debug)]
enum AttemptError {
    Transient(LlmGatewayError),
    Fatal(LlmGatewayError),
}

impl AttemptError {
    fn invalid_payload(reason: &str) -> Self {
        Self::Fatal(LlmGatewayError::InvalidProviderPayload(reason.to_string()))
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Exponential backoff: `base * 2^attempt`, saturating.
fn retry_delay(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(2_u64.saturating_pow(attempt)))
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS
    ) || status.is_server_error()
}

/// Reads `error.code` from an OpenAI error body, string or numeric.
fn provider_error_code(body: &str) -> String {
    let code = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.pointer("/error/code").cloned());
    match code {
        Some(Value::String(code)) => code,
        Some(Value::Number(code)) => code.to_string(),
        _ => "unknown".to_string(),
    }
}
