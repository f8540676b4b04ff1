use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackscrollError {
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Timed out after {timeout_ms}ms waiting for {selector}")]
    Timeout { selector: String, timeout_ms: u128 },

    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Progress relay channel closed")]
    RelayClosed,

    #[error("{0}")]
    Other(String),
}

impl BackscrollError {
    pub fn timeout(selector: &str, timeout: Duration) -> Self {
        Self::Timeout {
            selector: selector.to_string(),
            timeout_ms: timeout.as_millis(),
        }
    }

    /// Errors that must abort the whole batch instead of a single conversation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RelayClosed)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, BackscrollError>;
