use snafu::ensure;
use tokio::sync::{mpsc, oneshot};

use super::LanguageModel;
use super::error::{EmptyPromptSnafu, ModelResult, UnavailableSnafu};
use super::stream::{ResponseStreamHandle, SnapshotEvent, make_response_stream};

pub const SCRIPTED_MODEL_NAME: &str = "scripted";

/// Deterministic model that replays a fixed snapshot sequence regardless of
/// the prompt. The terminal event is `Done`, or `Error` when a failure is
/// scripted. Drives demos and every streaming test.
pub struct ScriptedModel {
    snapshots: Vec<String>,
    failure: Option<String>,
    available: bool,
}

impl ScriptedModel {
    /// A model that yields `snapshots` and completes normally.
    pub fn replying<I, S>(snapshots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            snapshots: snapshots.into_iter().map(Into::into).collect(),
            failure: None,
            available: true,
        }
    }

    /// A model that yields `snapshots` and then raises `message`.
    pub fn failing_with<I, S>(snapshots: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            failure: Some(message.into()),
            ..Self::replying(snapshots)
        }
    }

    /// A model whose availability predicate reports false.
    pub fn unavailable() -> Self {
        Self {
            snapshots: Vec::new(),
            failure: None,
            available: false,
        }
    }

    async fn run_stream_worker(
        snapshots: Vec<String>,
        failure: Option<String>,
        event_tx: mpsc::UnboundedSender<SnapshotEvent>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        for snapshot in snapshots {
            // Replay is instantaneous, so cancellation is only checked between
            // snapshots rather than awaited.
            if cancel_rx.try_recv().is_ok() {
                tracing::debug!("scripted stream cancelled");
                return;
            }

            if event_tx.send(SnapshotEvent::Snapshot(snapshot)).is_err() {
                return;
            }
        }

        let terminal = match failure {
            Some(message) => SnapshotEvent::Error(message),
            None => SnapshotEvent::Done,
        };
        let _ = event_tx.send(terminal);
    }
}

impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        SCRIPTED_MODEL_NAME
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn stream_response(&self, prompt: &str) -> ModelResult<ResponseStreamHandle> {
        ensure!(
            self.available,
            UnavailableSnafu {
                stage: "scripted-stream-response",
                model: SCRIPTED_MODEL_NAME,
            }
        );
        ensure!(
            !prompt.trim().is_empty(),
            EmptyPromptSnafu {
                stage: "scripted-stream-response",
            }
        );

        let (event_tx, stream, cancel_rx) = make_response_stream();
        let worker = Box::pin(Self::run_stream_worker(
            self.snapshots.clone(),
            self.failure.clone(),
            event_tx,
            cancel_rx,
        ));

        Ok(ResponseStreamHandle { stream, worker })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect_events(model: &ScriptedModel) -> Vec<SnapshotEvent> {
        let handle = model.stream_response("prompt").expect("stream starts");
        tokio::spawn(handle.worker);

        let mut stream = handle.stream;
        let mut events = Vec::new();
        while let Some(event) = stream.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn replays_snapshots_in_order_then_completes() {
        let model = ScriptedModel::replying(["H", "He", "Hel", "Hello"]);
        let events = collect_events(&model).await;

        assert_eq!(
            events,
            vec![
                SnapshotEvent::Snapshot("H".into()),
                SnapshotEvent::Snapshot("He".into()),
                SnapshotEvent::Snapshot("Hel".into()),
                SnapshotEvent::Snapshot("Hello".into()),
                SnapshotEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn scripted_failure_terminates_with_error() {
        let model = ScriptedModel::failing_with(["partial"], "engine crashed");
        let events = collect_events(&model).await;

        assert_eq!(
            events,
            vec![
                SnapshotEvent::Snapshot("partial".into()),
                SnapshotEvent::Error("engine crashed".into()),
            ]
        );
    }

    #[tokio::test]
    async fn cancelled_stream_stops_the_worker() {
        let model = ScriptedModel::replying(["a", "ab", "abc"]);
        let handle = model.stream_response("prompt").expect("stream starts");
        let worker = tokio::spawn(handle.worker);

        // The replay may already have finished; cancel must be harmless then.
        let mut stream = handle.stream;
        stream.cancel();
        worker.await.expect("worker exits after cancel");
    }

    #[test]
    fn unavailable_model_refuses_to_stream() {
        let model = ScriptedModel::unavailable();
        assert!(!model.is_available());
        assert!(model.stream_response("hi").is_err());
        assert!(ScriptedModel::replying(["x"]).is_available());
    }
}
