use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use super::id;
use super::message::{Message, MessageRole};

/// Number of messages a session needs before its title is derived from content.
pub const TITLE_THRESHOLD: usize = 2;

/// Maximum number of characters of the first user message kept in a derived title.
pub const TITLE_MAX_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: id::session_id(),
            title: placeholder_title(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now().max(self.updated_at);
    }

    pub fn first_user_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.role == MessageRole::User)
    }

    /// Rewrite the title from the first user message once the session is long enough.
    /// Returns true when the title changed.
    pub fn derive_title(&mut self) -> bool {
        if self.messages.len() < TITLE_THRESHOLD {
            return false;
        }
        let Some(first) = self.first_user_message() else {
            return false;
        };
        let title = truncate_title(&first.content);
        if title == self.title {
            return false;
        }
        self.title = title;
        true
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

pub fn placeholder_title() -> String {
    format!("New conversation {}", Local::now().format("%H:%M:%S"))
}

pub fn truncate_title(text: &str) -> String {
    let truncated: String = text.chars().take(TITLE_MAX_CHARS).collect();
    if text.chars().count() > TITLE_MAX_CHARS {
        format!("{truncated}...")
    } else {
        truncated
    }
}
