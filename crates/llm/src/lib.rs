pub mod echo;
pub mod error;
pub mod scripted;
pub mod stream;

pub use echo::EchoModel;
pub use error::{ModelError, ModelResult};
pub use scripted::ScriptedModel;
pub use stream::{ModelWorker, ResponseStream, ResponseStreamHandle, SnapshotEvent};

/// The narrow contract the chat core depends on: an availability predicate
/// plus a factory for streaming completions. How completions are produced is
/// the implementation's business.
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    /// Fast predicate, queried once per send before any streaming starts.
    fn is_available(&self) -> bool;

    /// Starts a completion for `prompt`. The returned worker must be spawned;
    /// the stream then yields cumulative snapshots until `Done` or `Error`.
    fn stream_response(&self, prompt: &str) -> ModelResult<ResponseStreamHandle>;
}
