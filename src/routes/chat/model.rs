use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::ChatLogRepository;
use crate::error::AppError;

/// Messages kept per user; older ones are dropped first.
pub const MAX_HISTORY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    #[serde(default)]
    pub is_image: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            is_image: false,
            created_at: Utc::now(),
        }
    }

    pub fn image(sender: Sender, data_uri: impl Into<String>) -> Self {
        Self {
            is_image: true,
            ..Self::new(sender, data_uri)
        }
    }
}

/// Incoming message as posted by the client; the timestamp is assigned on save.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub sender: Sender,
    pub text: String,
    #[serde(default)]
    pub is_image: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveMessageRequest {
    pub message: NewMessage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

pub struct ChatLog;

impl ChatLog {
    pub async fn history<R: ChatLogRepository + ?Sized>(
        repo: &R,
        user_id: Uuid,
    ) -> Result<Vec<ChatMessage>, AppError> {
        Ok(repo.load_log(user_id).await?.unwrap_or_default())
    }

    /// Read-modify-write without versioning: two concurrent appends for one
    /// user race and the later write wins.
    pub async fn append<R: ChatLogRepository + ?Sized>(
        repo: &R,
        user_id: Uuid,
        message: NewMessage,
    ) -> Result<Vec<ChatMessage>, AppError> {
        if message.text.is_empty() {
            return Err(AppError::InvalidInput("Message text is required".into()));
        }

        let mut messages = repo.load_log(user_id).await?.unwrap_or_default();
        messages.push(ChatMessage {
            sender: message.sender,
            text: message.text,
            is_image: message.is_image,
            created_at: Utc::now(),
        });
        truncate_oldest(&mut messages, MAX_HISTORY);

        repo.save_log(user_id, &messages).await?;
        Ok(messages)
    }

    pub async fn clear<R: ChatLogRepository + ?Sized>(
        repo: &R,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        repo.delete_log(user_id).await?;
        Ok(())
    }
}

fn truncate_oldest(messages: &mut Vec<ChatMessage>, cap: usize) {
    if messages.len() > cap {
        let excess = messages.len() - cap;
        messages.drain(..excess);
    }
}
