use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Format, Json, Serialized};
use serde::{Deserialize, Serialize};

use parley_store::CHATS_FILE_NAME;

/// Model selection for the built-in stand-ins.
pub const MODEL_ECHO: &str = "echo";
pub const MODEL_SCRIPTED: &str = "scripted";

const DEFAULT_LOG_FILTER: &str = "info";

// Dot-directory fallback when the platform reports no standard dirs.
const FALLBACK_DIR: &str = ".parley";

/// Settings that persist across app restarts. Anything not present in the
/// config file keeps its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Overrides where the chat collection lives. Defaults to the platform
    /// data directory.
    pub chats_path: Option<PathBuf>,
    /// Which built-in model backs conversations: "echo" or "scripted".
    pub model: String,
    /// Default tracing filter; the RUST_LOG environment variable wins.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chats_path: None,
            model: MODEL_ECHO.to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AppConfig {
    /// Returns the default config file path under the platform config dir.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("parley"))
            .unwrap_or_else(|| PathBuf::from(FALLBACK_DIR))
            .join("config.json")
    }

    /// Loads config from the default path.
    pub fn load() -> Self {
        Self::load_from(&Self::default_config_path())
    }

    /// Loads config from `path`, merging the file over serialized defaults.
    /// A missing or malformed file falls back to defaults with a log line;
    /// configuration problems never stop the app.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!(path = ?path, "config file not found, using defaults");
            return Self::default();
        }

        let figment =
            Figment::from(Serialized::defaults(Self::default())).merge(Json::file(path));

        match figment.extract::<Self>() {
            Ok(config) => config,
            Err(error) => {
                tracing::warn!(path = ?path, error = %error, "failed to parse config, using defaults");
                Self::default()
            }
        }
    }

    /// The resolved chats file location.
    pub fn chats_path(&self) -> PathBuf {
        self.chats_path.clone().unwrap_or_else(default_chats_path)
    }
}

/// Default chats file under the platform data directory.
pub fn default_chats_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("parley"))
        .unwrap_or_else(|| PathBuf::from(FALLBACK_DIR))
        .join(CHATS_FILE_NAME)
}
