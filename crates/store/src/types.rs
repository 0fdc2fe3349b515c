use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ChatId, MessageId};

/// Title given to a chat before its first user message arrives.
pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

/// One transcript entry. Identity fields are fixed at creation; `text` is
/// rewritten only while a streaming response is being assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(text: impl Into<String>, is_user: bool) -> Self {
        Self {
            id: MessageId::generate(),
            text: text.into(),
            is_user,
            timestamp: Utc::now(),
        }
    }

    /// Creates a message authored by the user.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text, true)
    }

    /// Creates a message authored by the model.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(text, false)
    }
}

/// One conversation thread: title + messages in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub title: String,
    pub messages: Vec<Message>,
}

impl Chat {
    /// Creates an empty chat with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: ChatId::generate(),
            title: title.into(),
            messages: Vec::new(),
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Store mutation notifications delivered to subscribers.
///
/// Events describe what already happened; by the time a subscriber observes
/// one, the collection and the file on disk reflect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    /// The persisted file was (re)read into memory.
    Loaded { chat_count: usize },
    ChatAdded { chat_id: ChatId },
    ChatUpdated { chat_id: ChatId },
    ChatRenamed { chat_id: ChatId },
    ChatDeleted { chat_id: ChatId },
    Cleared,
}
