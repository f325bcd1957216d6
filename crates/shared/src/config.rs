use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::config_env::{
    optional_trimmed_env, parse_u32_env, parse_u64_env, parse_usize_env, require_env,
};
use crate::llm::OpenAiGatewayConfig;
use crate::security::ReplayPolicy;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_TOKEN_TTL_SECONDS: u64 = 10 * 60 * 60;
const DEFAULT_REPLAY_MAX_AGE_MS: u64 = 5 * 60 * 1000;
const DEFAULT_REPLAY_CLOCK_SKEW_MS: u64 = 60 * 1000;
const DEFAULT_REPLAY_MIN_INTERVAL_MS: u64 = 1000;
const DEFAULT_REPLAY_SWEEP_INTERVAL_SECONDS: u64 = 60;
const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_OPENAI_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_OPENAI_MAX_RETRIES: u32 = 2;
const DEFAULT_OPENAI_RETRY_BASE_BACKOFF_MS: u64 = 250;
const DEFAULT_FAQ_PATH: &str = "data/faqs.json";
const DEFAULT_CHAT_LOG_DIR: &str = "logs";
const DEFAULT_ANSWER_CACHE_CAPACITY: usize = 50;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub nonce_encryption_key: String,
    pub jwt_secret: String,
    pub token_ttl_seconds: u64,
    pub replay_policy: ReplayPolicy,
    pub replay_sweep_interval: Option<Duration>,
    pub openai: OpenAiGatewayConfig,
    pub faq_path: PathBuf,
    pub chat_log_dir: PathBuf,
    pub answer_cache_capacity: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("failed to load .env file: {0}")]
    DotEnv(String),
}

/// Loads a `.env` file from the working directory when one exists.
pub fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(ConfigError::DotEnv(err.to_string())),
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let nonce_encryption_key = require_env("NONCE_ENCRYPTION_KEY")?;
        if !matches!(nonce_encryption_key.len(), 16 | 24 | 32) {
            return Err(ConfigError::InvalidConfiguration(format!(
                "NONCE_ENCRYPTION_KEY must be 16, 24 or 32 bytes, got {}",
                nonce_encryption_key.len()
            )));
        }

        let openai_api_url = optional_trimmed_env("OPENAI_API_URL")
            .unwrap_or_else(|| DEFAULT_OPENAI_API_URL.to_string());
        validate_http_url("OPENAI_API_URL", &openai_api_url)?;

        let sweep_seconds = parse_u64_env(
            "REPLAY_SWEEP_INTERVAL_SECONDS",
            DEFAULT_REPLAY_SWEEP_INTERVAL_SECONDS,
        )?;

        Ok(Self {
            bind_addr: optional_trimmed_env("API_BIND_ADDR")
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            nonce_encryption_key,
            jwt_secret: require_env("JWT_SECRET")?,
            token_ttl_seconds: parse_u64_env("TOKEN_TTL_SECONDS", DEFAULT_TOKEN_TTL_SECONDS)?,
            replay_policy: ReplayPolicy {
                max_age_ms: parse_i64_millis("REPLAY_MAX_AGE_MS", DEFAULT_REPLAY_MAX_AGE_MS)?,
                clock_skew_ms: parse_i64_millis(
                    "REPLAY_CLOCK_SKEW_MS",
                    DEFAULT_REPLAY_CLOCK_SKEW_MS,
                )?,
                min_interval_ms: parse_i64_millis(
                    "REPLAY_MIN_INTERVAL_MS",
                    DEFAULT_REPLAY_MIN_INTERVAL_MS,
                )?,
            },
            replay_sweep_interval: (sweep_seconds > 0).then(|| Duration::from_secs(sweep_seconds)),
            openai: OpenAiGatewayConfig {
                chat_completions_url: openai_api_url,
                api_key: require_env("OPENAI_API_KEY")?,
                model: optional_trimmed_env("OPENAI_MODEL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                timeout_ms: parse_u64_env("OPENAI_TIMEOUT_MS", DEFAULT_OPENAI_TIMEOUT_MS)?,
                max_retries: parse_u32_env("OPENAI_MAX_RETRIES", DEFAULT_OPENAI_MAX_RETRIES)?,
                retry_base_backoff_ms: parse_u64_env(
                    "OPENAI_RETRY_BASE_BACKOFF_MS",
                    DEFAULT_OPENAI_RETRY_BASE_BACKOFF_MS,
                )?,
            },
            faq_path: optional_trimmed_env("FAQ_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FAQ_PATH)),
            chat_log_dir: optional_trimmed_env("CHAT_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CHAT_LOG_DIR)),
            answer_cache_capacity: parse_usize_env(
                "ANSWER_CACHE_CAPACITY",
                DEFAULT_ANSWER_CACHE_CAPACITY,
            )?,
        })
    }
}

fn parse_i64_millis(key: &str, default: u64) -> Result<i64, ConfigError> {
    let raw = parse_u64_env(key, default)?;
    i64::try_from(raw).map_err(|_| ConfigError::ParseInt(key.to_string()))
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(value)
        .map_err(|_| ConfigError::InvalidConfiguration(format!("{key} is not a valid url")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidConfiguration(format!(
            "{key} must start with http:// or https://"
        )));
    }
    Ok(())
}
