//! Building the exported transcript and cutting it into month segments.
//!
//! # Usage
//!
//! ```rust,ignore
//! let transcript = transcript::assemble(&surface, "Family", &config).await?;
//! let html = transcript::render_document(&transcript);
//! for segment in transcript::split_by_month(&transcript, &config)? {
//!     sink.save(transcript::render_segment(&transcript, &segment).into_bytes(), &name);
//! }
//! ```

mod partition;
mod template;

pub use partition::{partition_by_month, render_segment, split_by_month};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::app::{BackscrollError, Result};
use crate::browser::ChatSurface;
use crate::domain::ExtractedTranscript;
use crate::media::sniff_extension;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Rows walked when partitioning, both messages and date separators
    pub row_selector: String,
    /// Message nodes inside a row
    pub message_selector: String,
    /// Messages the newest month needs to count as complete (default: 10)
    pub min_recent_messages: usize,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            row_selector: "[role=\"row\"]".to_string(),
            message_selector: ".message-in, .message-out".to_string(),
            min_recent_messages: 10,
        }
    }
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| BackscrollError::Config(format!("invalid selector {:?}: {:?}", selector, e)))
}

fn mime_type(bytes: &[u8]) -> &'static str {
    match sniff_extension(bytes) {
        Some("png") => "image/png",
        Some("jpg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Clone the open conversation into a self-contained transcript.
///
/// Blob-backed images only live as long as the page, so each one is fetched
/// and inlined as a `data:` URI. Images that cannot be fetched keep their
/// dead `blob:` source.
pub async fn assemble(
    surface: &dyn ChatSurface,
    title: &str,
    config: &TranscriptConfig,
) -> Result<ExtractedTranscript> {
    let snapshot = surface.snapshot_transcript().await?;
    let mut html = snapshot.html;

    for url in &snapshot.blob_images {
        match surface.fetch_blob(url).await {
            Ok(bytes) => {
                let data = format!("data:{};base64,{}", mime_type(&bytes), STANDARD.encode(&bytes));
                html = html.replace(&format!("src=\"{}\"", url), &format!("src=\"{}\"", data));
            }
            Err(e) => warn!("Could not inline {}: {}", url, e),
        }
    }

    let message_count = count_messages(&html, config)?;
    debug!(
        "Assembled transcript of {}: {} messages, {} inlined images",
        title,
        message_count,
        snapshot.blob_images.len()
    );

    Ok(ExtractedTranscript {
        title: title.to_string(),
        stylesheet: snapshot.stylesheet,
        body_html: html,
        message_count,
        exported_at: Utc::now(),
    })
}

/// Full standalone document for a transcript.
pub fn render_document(transcript: &ExtractedTranscript) -> String {
    template::render_document(
        &transcript.title,
        &transcript.stylesheet,
        &transcript.body_html,
        transcript.exported_at,
    )
}

/// Text of every message node in document order.
pub fn message_texts(html: &str, config: &TranscriptConfig) -> Result<Vec<String>> {
    let messages = parse_selector(&config.message_selector)?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&messages)
        .map(|m| m.text().collect::<String>().trim().to_string())
        .collect())
}

pub fn count_messages(html: &str, config: &TranscriptConfig) -> Result<usize> {
    let messages = parse_selector(&config.message_selector)?;
    Ok(Html::parse_fragment(html).select(&messages).count())
}
