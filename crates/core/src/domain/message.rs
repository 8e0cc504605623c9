use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One entry of a session's conversation history. User content is stored
/// already redacted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnMessage {
    pub role: MessageRole,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl TurnMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into(), at: Utc::now() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into(), at: Utc::now() }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == MessageRole::Assistant
    }
}
