use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::models::ChatLogEntry;

const LOG_FILE_PREFIX: &str = "chat_logs_";

#[derive(Debug, Error)]
pub enum ChatLogError {
    #[error("failed to create chat log directory {path}: {message}")]
    CreateDir { path: String, message: String },
    #[error("failed to write chat log {path}: {message}")]
    Write { path: String, message: String },
    #[error("failed to serialize chat log entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Appends question/answer pairs to one pretty-printed JSON file per day.
#[derive(Clone)]
pub struct ChatLog {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl ChatLog {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ChatLogError> {
        let dir = dir.into();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|err| ChatLogError::CreateDir {
                path: dir.display().to_string(),
                message: err.to_string(),
            })?;
            info!(path = %dir.display(), "created chat log directory");
        }

        Ok(Self {
            dir,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_for(&self, timestamp: NaiveDateTime) -> PathBuf {
        self.dir.join(format!(
            "{LOG_FILE_PREFIX}{}.json",
            timestamp.format("%Y-%m-%d")
        ))
    }

    /// Records a chat exchange. Failures are logged and otherwise ignored.
    pub async fn record(&self, username: &str, question: &str, answer: &str) {
        let entry = ChatLogEntry {
            username: username.to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
            timestamp: Local::now().naive_local(),
        };

        match self.append(&entry).await {
            Ok(path) => info!(username, path = %path.display(), "logged chat"),
            Err(err) => error!(username, error = %err, "failed to log chat"),
        }
    }

    pub async fn append(&self, entry: &ChatLogEntry) -> Result<PathBuf, ChatLogError> {
        let path = self.file_for(entry.timestamp);
        let serialized = serde_json::to_string_pretty(entry)?;
        let write_error = |err: std::io::Error| ChatLogError::Write {
            path: path.display().to_string(),
            message: err.to_string(),
        };

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(write_error)?;

        let existing_len = file.metadata().await.map_err(write_error)?.len();
        let mut buffer = String::with_capacity(serialized.len() + 1);
        if existing_len > 0 {
            buffer.push('\n');
        }
        buffer.push_str(&serialized);

        file.write_all(buffer.as_bytes()).await.map_err(write_error)?;
        file.flush().await.map_err(write_error)?;

        Ok(path)
    }
}
