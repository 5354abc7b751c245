use async_trait::async_trait;

use crate::core::error::ProviderError;
use crate::core::message::{Message, MessageRole};

/// Role and content of one message as sent to the completion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub content: String,
}

impl From<&Message> for ChatTurn {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub messages: Vec<ChatTurn>,
    pub api_key: String,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send the conversation and return the assistant's reply text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;

    fn model(&self) -> &str;
}
