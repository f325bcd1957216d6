pub mod answer_cache;
pub mod answers;
pub mod chat_log;
pub mod config;
mod config_env;
pub mod faq;
pub mod llm;
pub mod models;
pub mod security;
pub mod validation;
