use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::models::Faq;

#[derive(Debug, Error)]
pub enum FaqError {
    #[error("failed to read faq file {path}: {message}")]
    Read { path: String, message: String },
    #[error("faq file {path} is not a json list of questions: {message}")]
    Parse { path: String, message: String },
}

/// Example questions embedded in the system prompt.
#[derive(Debug, Clone, Default)]
pub struct FaqCatalog {
    faqs: Vec<Faq>,
}

impl FaqCatalog {
    pub fn new(faqs: Vec<Faq>) -> Self {
        Self { faqs }
    }

    pub fn load(path: &Path) -> Result<Self, FaqError> {
        let raw = std::fs::read_to_string(path).map_err(|err| FaqError::Read {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        let faqs: Vec<Faq> = serde_json::from_str(&raw).map_err(|err| FaqError::Parse {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;

        info!(count = faqs.len(), path = %path.display(), "loaded faqs");
        Ok(Self { faqs })
    }

    pub fn questions(&self) -> impl Iterator<Item = &str> {
        self.faqs.iter().map(|faq| faq.question.as_str())
    }

    pub fn len(&self) -> usize {
        self.faqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faqs.is_empty()
    }
}
