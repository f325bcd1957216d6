pub mod gateway;
pub mod openai;
pub mod prompts;

pub use gateway::{LlmGateway, LlmGatewayError, LlmGatewayFuture, LlmRequest};
pub use openai::{OpenAiConfigError, OpenAiGateway, OpenAiGatewayConfig};
pub use prompts::{FALLBACK_ANSWER, build_system_prompt};
