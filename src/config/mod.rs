//! Configuration management for backscroll.
//!
//! Configuration is read from `~/.config/backscroll/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::browser::{BrowserConfig, SelectorTable};
use crate::export::ExportConfig;
use crate::history::HistoryConfig;
use crate::interaction::InteractionConfig;
use crate::media::MediaConfig;
use crate::transcript::TranscriptConfig;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserConfig,
    pub selectors: SelectorTable,
    pub history: HistoryConfig,
    pub media: MediaConfig,
    pub transcript: TranscriptConfig,
    pub interaction: InteractionConfig,
    pub export: ExportConfig,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// Missing fields in the config file use default values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            Self::create_default_config(config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/backscroll/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("backscroll").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    ///
    /// Selectors only appear as commented examples.
    fn default_config_content() -> String {
        r##"# backscroll configuration
#
# Every key is optional; anything left out uses the built-in default.

[browser]
# Show the browser window (needed for the first QR-code login)
headless = false

# Attach to a running Chrome instead of launching one, e.g.
# cdp_url = "http://127.0.0.1:9222"

# Persistent profile keeps the chat client logged in between runs
# user_data_dir = "/home/me/.local/share/backscroll/profile"

app_url = "https://web.whatsapp.com/"

# Seconds to wait for the conversation list after opening the client
login_timeout_secs = 180

# [selectors]
# Override any CSS selector the engine uses when the host markup changes, e.g.
# message_pane = "#main"
# load_older = "#main button[title*=\"older\" i]"

[history]
# Hard cap on scroll iterations per conversation
max_attempts = 400

# Iterations without new messages before giving up
max_unchanged_iterations = 5

# Arrivals at the top recovery tier before reopening the conversation
emergency_after_top_tier_hits = 3
failure_reset_floor = 1

# Total failures before the last-resort recovery
total_failure_ceiling = 15

# Delays in milliseconds
step_delay_ms = 1500
recovery_delay_ms = 1000

alternate_offset_px = 150.0

[media]
# Any of "image", "video", "document", "link"
kinds = ["image", "video", "document", "link"]
max_passes = 40

# Passes in a row where neither scroll offset nor content height changed
idle_pass_limit = 3
pass_delay_ms = 900
download_delay_ms = 600
links_file_name = "links.txt"

[transcript]
row_selector = "[role=\"row\"]"
message_selector = ".message-in, .message-out"

# Messages the newest month needs before it is exported on its own
min_recent_messages = 10

[interaction]
# Random click offset in pixels
jitter_px = 3.0

# Pause between pointer events in milliseconds
min_delay_ms = 20
max_delay_ms = 80

[export]
# Defaults to <downloads>/backscroll
# output_dir = "/home/me/chat-exports"

pane_timeout_secs = 20
select_settle_ms = 1000
conversation_list_scrolls = 15
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MediaKind;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_deserializes() {
        let content = Config::default_config_content();
        let config: Config = toml::from_str(&content).expect("Default config should be valid TOML");
        let defaults = Config::default();

        assert_eq!(config.history.max_attempts, defaults.history.max_attempts);
        assert_eq!(config.history.recovery_delay_ms, defaults.history.recovery_delay_ms);
        assert_eq!(config.media.kinds, MediaKind::ALL.to_vec());
        assert_eq!(config.transcript.row_selector, defaults.transcript.row_selector);
        assert_eq!(config.transcript.min_recent_messages, 10);
        assert_eq!(config.export.pane_timeout_secs, defaults.export.pane_timeout_secs);
        assert_eq!(config.selectors.message_pane, defaults.selectors.message_pane);
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[history]
max_attempts = 50

[media]
kinds = ["link"]

[selectors]
message_pane = "#conversation"
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        assert_eq!(config.history.max_attempts, 50);
        assert_eq!(config.history.max_unchanged_iterations, 5);
        assert_eq!(config.media.kinds, vec![MediaKind::Link]);
        assert_eq!(config.selectors.message_pane, "#conversation");
        assert_eq!(config.selectors.row, SelectorTable::default().row);
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");
        assert_eq!(config.history.total_failure_ceiling, 15);
        assert_eq!(config.interaction.max_delay_ms, 80);
    }

    #[test]
    fn test_load_from_creates_default_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.history.max_attempts, 400);

        // second load parses the file that was just written
        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.media.max_passes, config.media.max_passes);
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[history]\nmax_attempts = \"many\"\n").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
