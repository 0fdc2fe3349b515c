pub mod config;
pub mod conversation;

pub use config::AppConfig;
pub use conversation::{
    ConversationController, MODEL_UNAVAILABLE_TEXT, STREAMING_PLACEHOLDER, SendOutcome, SendPhase,
};
