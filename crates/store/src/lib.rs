pub mod error;
pub mod ids;
pub mod json;
pub mod types;

use tokio::sync::broadcast;

pub use error::{StoreError, StoreResult};
pub use ids::{ChatId, MessageId};
pub use json::{CHATS_FILE_NAME, JsonChatStore};
pub use types::{Chat, DEFAULT_CHAT_TITLE, Message, StoreEvent};

/// Durable store of all chats, exposed as an observable in-memory collection.
///
/// Every mutating operation persists the full collection before returning.
/// Implementations are expected to be shared behind `Arc` and guard their
/// collection internally.
pub trait ChatStore: Send + Sync {
    /// Snapshot of the collection, most-recent-first.
    fn chats(&self) -> Vec<Chat>;

    /// Creates an empty chat with the requested title at the head of the
    /// collection and persists it.
    fn add_chat_titled(&self, title: &str) -> Chat;

    /// Creates an empty chat with the default title.
    fn add_chat(&self) -> Chat {
        self.add_chat_titled(DEFAULT_CHAT_TITLE)
    }

    /// Replaces the stored chat with the same id wholesale. Unknown ids are
    /// dropped silently: the chat was deleted while the caller held its copy.
    fn update_chat(&self, chat: &Chat);

    fn delete_chat(&self, chat_id: ChatId);

    fn rename_chat(&self, chat_id: ChatId, new_title: &str);

    fn clear_all(&self);

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}
