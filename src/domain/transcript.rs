use chrono::{DateTime, Utc};

/// Serialized content of one conversation, ready to be partitioned.
#[derive(Debug, Clone)]
pub struct ExtractedTranscript {
    pub title: String,
    /// Stylesheet rules captured from the host page.
    pub stylesheet: String,
    /// Cloned message container with blob-backed media inlined.
    pub body_html: String,
    pub message_count: usize,
    pub exported_at: DateTime<Utc>,
}
