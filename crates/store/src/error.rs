use std::path::PathBuf;

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("store id '{raw}' is invalid for {id_type}"))]
    InvalidId {
        stage: &'static str,
        id_type: &'static str,
        raw: String,
        source: uuid::Error,
    },
    #[snafu(display("failed to create chats directory at {path:?} on `{stage}`: {source}"))]
    CreateChatsDirectory {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to read chats file at {path:?} on `{stage}`: {source}"))]
    ReadChatsFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to decode chats file at {path:?} on `{stage}`: {source}"))]
    DecodeChats {
        stage: &'static str,
        path: PathBuf,
        source: serde_json::Error,
    },
    #[snafu(display("failed to encode chats on `{stage}`: {source}"))]
    EncodeChats {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write chats file at {path:?} on `{stage}`: {source}"))]
    WriteChatsFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to replace chats file from {from:?} to {to:?} on `{stage}`: {source}"))]
    ReplaceChatsFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;
