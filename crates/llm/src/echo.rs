use std::time::Duration;

use snafu::ensure;
use tokio::sync::{mpsc, oneshot};

use super::LanguageModel;
use super::error::{EmptyPromptSnafu, ModelResult};
use super::stream::{ResponseStreamHandle, SnapshotEvent, make_response_stream};

pub const ECHO_MODEL_NAME: &str = "echo";

const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(30);

/// Always-available stand-in model that streams the prompt back one word at a
/// time. Useful wherever a real on-device engine is absent.
pub struct EchoModel {
    chunk_delay: Duration,
}

impl EchoModel {
    pub fn new() -> Self {
        Self {
            chunk_delay: DEFAULT_CHUNK_DELAY,
        }
    }

    /// Overrides the pause between snapshots. `Duration::ZERO` makes the
    /// stream run as fast as the consumer drains it.
    pub fn with_chunk_delay(mut self, chunk_delay: Duration) -> Self {
        self.chunk_delay = chunk_delay;
        self
    }

    async fn run_stream_worker(
        reply: String,
        chunk_delay: Duration,
        event_tx: mpsc::UnboundedSender<SnapshotEvent>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        for snapshot in cumulative_word_snapshots(&reply) {
            tokio::select! {
                _ = &mut cancel_rx => {
                    tracing::debug!("echo stream cancelled");
                    return;
                }
                _ = tokio::time::sleep(chunk_delay) => {}
            }

            if event_tx.send(SnapshotEvent::Snapshot(snapshot)).is_err() {
                return;
            }
        }

        let _ = event_tx.send(SnapshotEvent::Done);
    }
}

impl Default for EchoModel {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageModel for EchoModel {
    fn name(&self) -> &str {
        ECHO_MODEL_NAME
    }

    fn is_available(&self) -> bool {
        true
    }

    fn stream_response(&self, prompt: &str) -> ModelResult<ResponseStreamHandle> {
        ensure!(
            !prompt.trim().is_empty(),
            EmptyPromptSnafu {
                stage: "echo-stream-response",
            }
        );

        let reply = format!("You said: {prompt}");
        let (event_tx, stream, cancel_rx) = make_response_stream();
        let worker = Box::pin(Self::run_stream_worker(
            reply,
            self.chunk_delay,
            event_tx,
            cancel_rx,
        ));

        Ok(ResponseStreamHandle { stream, worker })
    }
}

/// Expands a reply into the cumulative response-so-far sequence a streaming
/// model would produce, growing one word per snapshot.
fn cumulative_word_snapshots(reply: &str) -> Vec<String> {
    let mut snapshots = Vec::new();
    let mut in_word = false;

    for (index, character) in reply.char_indices() {
        if character.is_whitespace() {
            in_word = false;
        } else if !in_word {
            in_word = true;
            if index > 0 {
                // A new word starts here; the previous prefix was complete.
                snapshots.push(reply[..index].trim_end().to_string());
            }
        }
    }

    if !reply.trim_end().is_empty() {
        snapshots.push(reply.trim_end().to_string());
    }

    snapshots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_grow_one_word_at_a_time() {
        assert_eq!(
            cumulative_word_snapshots("one two three"),
            vec!["one", "one two", "one two three"]
        );
    }

    #[test]
    fn snapshots_of_blank_reply_are_empty() {
        assert!(cumulative_word_snapshots("   ").is_empty());
    }

    #[tokio::test]
    async fn echo_streams_cumulative_snapshots_then_done() {
        let model = EchoModel::new().with_chunk_delay(Duration::ZERO);
        let handle = model.stream_response("hi there").expect("stream starts");
        tokio::spawn(handle.worker);

        let mut stream = handle.stream;
        let mut events = Vec::new();
        while let Some(event) = stream.recv().await {
            events.push(event);
        }

        assert_eq!(
            events.last(),
            Some(&SnapshotEvent::Done),
            "stream must terminate with Done"
        );
        assert_eq!(
            events[events.len() - 2],
            SnapshotEvent::Snapshot("You said: hi there".to_string())
        );
    }

    #[test]
    fn empty_prompt_is_refused() {
        let model = EchoModel::new();
        assert!(model.stream_response("   ").is_err());
    }
}
