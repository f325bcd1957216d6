use std::sync::Arc;

use tracing::{info, warn};

use crate::answer_cache::AnswerCache;
use crate::chat_log::ChatLog;
use crate::faq::FaqCatalog;
use crate::llm::{FALLBACK_ANSWER, LlmGateway, LlmRequest, build_system_prompt};

/// Answers questions for authenticated users, consulting the cache before
/// the language model and logging every answered exchange.
#[derive(Clone)]
pub struct AnswerService {
    faqs: Arc<FaqCatalog>,
    gateway: Arc<dyn LlmGateway>,
    cache: AnswerCache,
    chat_log: ChatLog,
}

impl AnswerService {
    pub fn new(
        faqs: FaqCatalog,
        gateway: Arc<dyn LlmGateway>,
        cache: AnswerCache,
        chat_log: ChatLog,
    ) -> Self {
        Self {
            faqs: Arc::new(faqs),
            gateway,
            cache,
            chat_log,
        }
    }

    pub async fn answer(&self, username: &str, question: &str) -> String {
        let question = question.trim();
        let cache_key = AnswerCache::key(username, question);

        if let Some(cached) = self.cache.get(&cache_key) {
            info!(username, "answer cache hit");
            self.chat_log.record(username, question, &cached).await;
            return cached;
        }

        let request = LlmRequest {
            system_prompt: build_system_prompt(&self.faqs, username),
            question: question.to_string(),
        };

        let answer = match self.gateway.complete(request).await {
            Ok(answer) if !answer.trim().is_empty() => answer,
            Ok(_) => {
                warn!(username, "received empty answer from llm provider");
                return FALLBACK_ANSWER.to_string();
            }
            Err(err) => {
                warn!(username, error = %err, "llm request failed");
                return FALLBACK_ANSWER.to_string();
            }
        };

        self.chat_log.record(username, question, &answer).await;
        self.cache.put(cache_key, answer.clone());
        answer
    }
}
