use std::sync::Arc;

use parley_llm::{LanguageModel, ResponseStream, SnapshotEvent};
use parley_store::{Chat, ChatStore, Message};

/// Assistant text shown when the model's availability predicate says no.
pub const MODEL_UNAVAILABLE_TEXT: &str = "Model not available.";

/// Assistant text shown between accepting a send and the first snapshot.
pub const STREAMING_PLACEHOLDER: &str = "…";

/// Per-send lifecycle. `Streaming` is entered only after the availability
/// check passes and a placeholder message is in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPhase {
    Idle,
    Sending,
    Streaming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The trimmed input was empty; the transcript was not touched.
    RejectedEmpty,
    /// A send is already in flight; sends are rejected, never queued.
    RejectedBusy,
    /// The exchange reached a terminal state and the transcript was persisted.
    Completed,
}

/// Mediates one chat's live exchange with the language model.
///
/// The controller owns a detached copy of the chat; the store's copy is only
/// replaced on explicit `update_chat` calls (send completion, manual clear,
/// close). Two controllers over the same chat clobber each other last-writer-
/// wins, and a finished send for a chat deleted in the meantime is dropped by
/// the store.
pub struct ConversationController {
    store: Arc<dyn ChatStore>,
    model: Arc<dyn LanguageModel>,
    chat: Chat,
    phase: SendPhase,
}

impl ConversationController {
    pub fn new(store: Arc<dyn ChatStore>, model: Arc<dyn LanguageModel>, chat: Chat) -> Self {
        Self {
            store,
            model,
            chat,
            phase: SendPhase::Idle,
        }
    }

    /// The working copy of the transcript.
    pub fn chat(&self) -> &Chat {
        &self.chat
    }

    pub fn is_processing(&self) -> bool {
        self.phase != SendPhase::Idle
    }

    /// Runs one full exchange: appends the user message, streams the model's
    /// response into a placeholder, and persists the final transcript.
    ///
    /// The user message is visible in the transcript before any model
    /// activity. Snapshots are applied here, on the transcript's single
    /// owner; the model worker only ever touches its event channel.
    pub async fn send_message(&mut self, input: &str) -> SendOutcome {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return SendOutcome::RejectedEmpty;
        }
        // The exclusive borrow already serializes direct callers; the phase
        // guard rejects re-entrant sends from drivers that reach the
        // controller through a shared handle while an exchange is pending.
        if self.phase != SendPhase::Idle {
            return SendOutcome::RejectedBusy;
        }

        self.chat.messages.push(Message::user(input));
        // The first message names the chat, whitespace and all.
        if self.chat.messages.len() == 1 {
            self.chat.title = input.to_string();
        }
        self.phase = SendPhase::Sending;

        if !self.model.is_available() {
            tracing::debug!(model = %self.model.name(), "model unavailable, degrading to transcript message");
            self.chat.messages.push(Message::assistant(MODEL_UNAVAILABLE_TEXT));
            return self.finish_send();
        }

        match self.model.stream_response(trimmed) {
            Ok(handle) => {
                self.phase = SendPhase::Streaming;
                self.chat
                    .messages
                    .push(Message::assistant(STREAMING_PLACEHOLDER));
                let placeholder_index = self.chat.messages.len() - 1;

                tokio::spawn(handle.worker);
                self.consume_stream(handle.stream, placeholder_index).await;
            }
            Err(error) => {
                tracing::warn!(
                    model = %self.model.name(),
                    error = %error,
                    "failed to start response stream"
                );
                self.chat
                    .messages
                    .push(Message::assistant(format!("Error: {error}")));
            }
        }

        self.finish_send()
    }

    async fn consume_stream(&mut self, mut stream: ResponseStream, placeholder_index: usize) {
        while let Some(event) = stream.recv().await {
            match event {
                SnapshotEvent::Snapshot(content) => {
                    // Cumulative snapshot: overwrite, never append.
                    self.chat.messages[placeholder_index].text = content;
                }
                SnapshotEvent::Done => break,
                SnapshotEvent::Error(message) => {
                    // The placeholder keeps its last partial content; the
                    // failure arrives as a separate message.
                    self.chat
                        .messages
                        .push(Message::assistant(format!("Error: {message}")));
                    break;
                }
            }
        }
    }

    fn finish_send(&mut self) -> SendOutcome {
        self.phase = SendPhase::Idle;
        // The only persistence point of the exchange.
        self.store.update_chat(&self.chat);
        SendOutcome::Completed
    }

    /// Empties the transcript and persists immediately.
    pub fn clear_messages(&mut self) {
        self.chat.messages.clear();
        self.store.update_chat(&self.chat);
    }

    /// Renames the working copy and the stored chat.
    pub fn rename(&mut self, new_title: &str) {
        self.chat.title = new_title.to_string();
        self.store.rename_chat(self.chat.id, new_title);
    }

    /// Pushes the working copy to the store. Call when the conversation is
    /// closed so edits made outside a send are not lost.
    pub fn persist(&self) {
        self.store.update_chat(&self.chat);
    }

    #[cfg(test)]
    fn force_phase(&mut self, phase: SendPhase) {
        self.phase = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_llm::ScriptedModel;
    use parley_store::{CHATS_FILE_NAME, JsonChatStore};

    fn harness(
        model: ScriptedModel,
    ) -> (tempfile::TempDir, Arc<JsonChatStore>, ConversationController) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(JsonChatStore::open(dir.path().join(CHATS_FILE_NAME)));
        let chat = store.add_chat();
        let controller = ConversationController::new(store.clone(), Arc::new(model), chat);
        (dir, store, controller)
    }

    fn stored_chat(store: &JsonChatStore) -> Chat {
        store.chats().into_iter().next().expect("one stored chat")
    }

    #[tokio::test]
    async fn cumulative_snapshots_collapse_into_one_assistant_message() {
        let (_dir, store, mut controller) =
            harness(ScriptedModel::replying(["H", "He", "Hel", "Hello"]));

        let outcome = controller.send_message("Hi").await;

        assert_eq!(outcome, SendOutcome::Completed);
        assert!(!controller.is_processing());
        let messages = &controller.chat().messages;
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_user);
        assert_eq!(messages[0].text, "Hi");
        assert!(!messages[1].is_user);
        assert_eq!(messages[1].text, "Hello");
        assert_eq!(stored_chat(&store), *controller.chat());
    }

    #[tokio::test]
    async fn stream_failure_keeps_the_partial_and_appends_an_error() {
        let (_dir, store, mut controller) =
            harness(ScriptedModel::failing_with(["partial"], "engine crashed"));

        controller.send_message("Hi").await;

        let messages = &controller.chat().messages;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].text, "partial");
        assert_eq!(messages[2].text, "Error: engine crashed");
        assert!(!messages[2].is_user);
        assert_eq!(stored_chat(&store), *controller.chat());
    }

    #[tokio::test]
    async fn blank_input_never_mutates_the_transcript() {
        let (_dir, store, mut controller) = harness(ScriptedModel::replying(["x"]));

        assert_eq!(controller.send_message("").await, SendOutcome::RejectedEmpty);
        assert_eq!(
            controller.send_message("   ").await,
            SendOutcome::RejectedEmpty
        );

        assert!(controller.chat().messages.is_empty());
        assert!(stored_chat(&store).messages.is_empty());
    }

    #[tokio::test]
    async fn send_while_one_is_in_flight_is_rejected_not_queued() {
        let (_dir, store, mut controller) = harness(ScriptedModel::replying(["ok"]));

        controller.force_phase(SendPhase::Streaming);
        assert!(controller.is_processing());
        assert_eq!(
            controller.send_message("impatient").await,
            SendOutcome::RejectedBusy
        );
        assert!(controller.chat().messages.is_empty());
        assert!(stored_chat(&store).messages.is_empty());

        // Once the pending exchange ends, sends are accepted again.
        controller.force_phase(SendPhase::Idle);
        assert_eq!(
            controller.send_message("patient").await,
            SendOutcome::Completed
        );
    }

    #[tokio::test]
    async fn first_send_titles_the_chat_with_the_untrimmed_text() {
        let (_dir, _store, mut controller) =
            harness(ScriptedModel::replying(["sure", "sure thing"]));

        controller.send_message("  plan my week  ").await;
        assert_eq!(controller.chat().title, "  plan my week  ");
        assert_eq!(controller.chat().messages[0].text, "  plan my week  ");

        controller.send_message("second question").await;
        assert_eq!(controller.chat().title, "  plan my week  ");
    }

    #[tokio::test]
    async fn unavailable_model_degrades_to_a_transcript_message() {
        let (_dir, store, mut controller) = harness(ScriptedModel::unavailable());

        let outcome = controller.send_message("anyone there?").await;

        assert_eq!(outcome, SendOutcome::Completed);
        let messages = &controller.chat().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text, MODEL_UNAVAILABLE_TEXT);
        assert!(!messages[1].is_user);
        assert_eq!(stored_chat(&store), *controller.chat());
    }

    #[tokio::test]
    async fn clear_messages_empties_and_persists() {
        let (_dir, store, mut controller) = harness(ScriptedModel::replying(["ok"]));

        controller.send_message("hello").await;
        controller.clear_messages();

        assert!(controller.chat().messages.is_empty());
        assert!(stored_chat(&store).messages.is_empty());
    }

    #[tokio::test]
    async fn send_completion_for_a_deleted_chat_is_dropped() {
        let (_dir, store, mut controller) = harness(ScriptedModel::replying(["late reply"]));

        store.delete_chat(controller.chat().id);
        controller.send_message("still here?").await;

        // The working copy finished its exchange, but the store no-ops.
        assert_eq!(controller.chat().messages.len(), 2);
        assert!(store.chats().is_empty());
    }

    #[tokio::test]
    async fn rename_updates_the_working_copy_and_the_store() {
        let (_dir, store, mut controller) = harness(ScriptedModel::replying(["ok"]));

        controller.rename("Weekly planning");

        assert_eq!(controller.chat().title, "Weekly planning");
        assert_eq!(stored_chat(&store).title, "Weekly planning");
    }

    #[tokio::test]
    async fn persist_pushes_local_edits_on_close() {
        let (_dir, store, mut controller) = harness(ScriptedModel::replying(["ok"]));

        controller.send_message("hello").await;
        controller.chat.title = "edited locally".to_string();
        controller.persist();

        assert_eq!(stored_chat(&store).title, "edited locally");
    }
}
