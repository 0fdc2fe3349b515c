use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use snafu::ResultExt;
use tokio::sync::broadcast;

use super::ChatStore;
use super::error::{
    CreateChatsDirectorySnafu, DecodeChatsSnafu, EncodeChatsSnafu, ReadChatsFileSnafu,
    ReplaceChatsFileSnafu, StoreResult, WriteChatsFileSnafu,
};
use super::ids::ChatId;
use super::types::{Chat, StoreEvent};

/// File name of the persisted chat collection inside the data directory.
pub const CHATS_FILE_NAME: &str = "chats.json";

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Durable chat store backed by a single JSON document.
///
/// The whole collection is re-serialized after every mutation; there is no
/// batching, no dirty flag, no debounce. Mutations hold the collection lock
/// through the disk write, so concurrent writers behind an `Arc` cannot land
/// snapshots out of order or collide on the temp file. Persistence failures
/// are logged and swallowed so a full disk degrades to warnings, never a
/// crash.
pub struct JsonChatStore {
    chats: Mutex<Vec<Chat>>,
    save_path: PathBuf,
    events: broadcast::Sender<StoreEvent>,
}

impl JsonChatStore {
    /// Opens a store at `save_path` and reads the persisted collection
    /// best-effort. A missing or malformed file leaves the store empty.
    pub fn open(save_path: impl Into<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let store = Self {
            chats: Mutex::new(Vec::new()),
            save_path: save_path.into(),
            events,
        };
        store.load();
        store
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    /// Re-reads the persisted file. On a missing file or a decode failure the
    /// in-memory collection is left unchanged; the failure is logged so it
    /// stays visible without interrupting the session.
    pub fn load(&self) {
        match self.read_chats_file() {
            Ok(Some(decoded)) => {
                let chat_count = decoded.len();
                *self.guard() = decoded;
                self.emit(StoreEvent::Loaded { chat_count });
            }
            Ok(None) => {
                tracing::debug!(path = ?self.save_path, "chats file not found, keeping current collection");
            }
            Err(error) => {
                tracing::warn!(
                    path = ?self.save_path,
                    error = %error,
                    "failed to load chats, keeping current collection"
                );
            }
        }
    }

    /// Serializes the full collection and atomically replaces the file.
    pub fn save(&self) -> StoreResult<()> {
        let chats = self.guard();
        self.write_snapshot(&chats)
    }

    // Callers must hold the collection lock and pass its view: serializing
    // writes under the lock keeps disk in mutation order and keeps the temp
    // file single-writer.
    fn write_snapshot(&self, chats: &[Chat]) -> StoreResult<()> {
        let encoded = serde_json::to_string_pretty(chats).context(EncodeChatsSnafu {
            stage: "encode-chats-json",
        })?;

        if let Some(parent) = self.save_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context(CreateChatsDirectorySnafu {
                stage: "create-chats-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let temp_path = self.save_path.with_extension("json.tmp");
        std::fs::write(&temp_path, encoded).context(WriteChatsFileSnafu {
            stage: "write-temporary-chats-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.save_path).context(ReplaceChatsFileSnafu {
            stage: "rename-temporary-chats-file",
            from: temp_path,
            to: self.save_path.clone(),
        })?;

        Ok(())
    }

    fn read_chats_file(&self) -> StoreResult<Option<Vec<Chat>>> {
        let raw = match std::fs::read(&self.save_path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(source).context(ReadChatsFileSnafu {
                    stage: "read-chats-file",
                    path: self.save_path.clone(),
                });
            }
        };

        let decoded = serde_json::from_slice::<Vec<Chat>>(&raw).context(DecodeChatsSnafu {
            stage: "decode-chats-json",
            path: self.save_path.clone(),
        })?;
        Ok(Some(decoded))
    }

    // A poisoned lock still holds a structurally valid collection.
    fn guard(&self) -> MutexGuard<'_, Vec<Chat>> {
        self.chats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is the common case for headless use.
        let _ = self.events.send(event);
    }

    fn persist(&self, chats: &[Chat], operation: &'static str) {
        if let Err(error) = self.write_snapshot(chats) {
            tracing::warn!(
                operation,
                path = ?self.save_path,
                error = %error,
                "failed to persist chats"
            );
        }
    }
}

impl ChatStore for JsonChatStore {
    fn chats(&self) -> Vec<Chat> {
        self.guard().clone()
    }

    fn add_chat_titled(&self, title: &str) -> Chat {
        let chat = Chat::new(title);
        let mut chats = self.guard();
        chats.insert(0, chat.clone());
        self.persist(&chats, "add-chat");
        drop(chats);
        self.emit(StoreEvent::ChatAdded { chat_id: chat.id });
        chat
    }

    fn update_chat(&self, chat: &Chat) {
        let mut chats = self.guard();
        let Some(existing) = chats.iter_mut().find(|existing| existing.id == chat.id) else {
            // The chat was deleted concurrently; drop the update.
            tracing::debug!(chat_id = %chat.id, "update for unknown chat dropped");
            return;
        };
        *existing = chat.clone();
        self.persist(&chats, "update-chat");
        drop(chats);
        self.emit(StoreEvent::ChatUpdated { chat_id: chat.id });
    }

    fn delete_chat(&self, chat_id: ChatId) {
        let mut chats = self.guard();
        let before = chats.len();
        chats.retain(|chat| chat.id != chat_id);
        if chats.len() == before {
            return;
        }
        self.persist(&chats, "delete-chat");
        drop(chats);
        self.emit(StoreEvent::ChatDeleted { chat_id });
    }

    fn rename_chat(&self, chat_id: ChatId, new_title: &str) {
        let mut chats = self.guard();
        let Some(chat) = chats.iter_mut().find(|chat| chat.id == chat_id) else {
            return;
        };
        chat.title = new_title.to_string();
        self.persist(&chats, "rename-chat");
        drop(chats);
        self.emit(StoreEvent::ChatRenamed { chat_id });
    }

    fn clear_all(&self) {
        let mut chats = self.guard();
        chats.clear();
        self.persist(&chats, "clear-all");
        drop(chats);
        self.emit(StoreEvent::Cleared);
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
