use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// One turn of a conversation. Never edited after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Message {
    fn new(role: MessageRole, content: String, is_error: bool) -> Self {
        Self {
            id: id::message_id(),
            role,
            content,
            timestamp: Utc::now(),
            is_error,
        }
    }

    pub fn new_user(content: String) -> Self {
        Self::new(MessageRole::User, content, false)
    }

    pub fn new_assistant(content: String) -> Self {
        Self::new(MessageRole::Assistant, content, false)
    }

    /// Assistant-authored reply standing in for a failed completion.
    pub fn new_error(content: String) -> Self {
        Self::new(MessageRole::Assistant, content, true)
    }
}
