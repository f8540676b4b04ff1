//! Page surface: everything the export engine needs from the live chat page.
//!
//! The engine never talks to Chrome directly. It goes through the
//! [`ChatSurface`] trait, which [`ChromeSurface`] implements by evaluating
//! generated JavaScript and dispatching CDP input events.
//!
//! # Architecture
//!
//! ```text
//! Engine (history, media, transcript) → ChatSurface → ChromeSurface → CDP
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use backscroll::browser::{BrowserConfig, ChromeSurface, SelectorTable};
//!
//! let surface = ChromeSurface::open(&BrowserConfig::default(), SelectorTable::default()).await?;
//! let conversations = surface.list_conversations().await?;
//! ```

mod chrome;
mod config;
#[cfg(test)]
pub(crate) mod fake;
mod scripts;

pub use chrome::ChromeSurface;
pub use config::{BrowserConfig, SelectorTable};
pub use scripts::ScriptBuilder;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::app::Result;
use crate::domain::{Conversation, ElementHandle, MediaKind};

/// Element bounding box in CSS pixels, relative to the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEventKind {
    Moved,
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    pub x: f64,
    pub y: f64,
}

/// Geometry of the message scroll container.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollCommand {
    /// Scroll the oldest rendered message into view.
    FirstMessageIntoView { smooth: bool },
    /// Assign the container's `scrollTop` directly.
    SetScrollTop(f64),
    /// Scroll the container by a relative amount.
    ScrollBy(f64),
    ToBottom,
}

/// Raw date hints scraped around the oldest rendered message.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DateEvidence {
    /// Structured timestamp attributes, e.g. `[10:30, 12/03/2024] Alice: `.
    pub timestamp_attributes: Vec<String>,
    /// Visible date separator texts in document order.
    pub separator_texts: Vec<String>,
    /// Texts of rows preceding the oldest message, nearest first.
    pub sibling_texts: Vec<String>,
}

/// One media element as rendered right now.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MediaCandidate {
    pub url: Option<String>,
    pub label: Option<String>,
    /// Vertical offset inside the scroll content.
    pub offset: Option<f64>,
    pub download_control: Option<ElementHandle>,
}

/// Clone of the message container taken for the transcript.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TranscriptSnapshot {
    pub html: String,
    pub blob_images: Vec<String>,
    pub stylesheet: String,
}

/// Operations on the live chat page.
#[async_trait]
pub trait ChatSurface: Send + Sync {
    /// First element matching `selector` that is visible in the viewport.
    async fn find_visible(&self, selector: &str) -> Result<Option<ElementHandle>>;

    /// Suspend until the document mutates or `timeout` elapses.
    ///
    /// Returns `true` if a mutation was observed.
    async fn await_mutation(&self, timeout: Duration) -> Result<bool>;

    /// `None` when the element is detached or has an empty box.
    async fn bounding_box(&self, element: &ElementHandle) -> Result<Option<Rect>>;

    async fn dispatch_pointer(&self, event: PointerEvent) -> Result<()>;

    /// Bring the page to the foreground before scrolling.
    async fn ensure_focus(&self) -> Result<()>;

    async fn list_conversations(&self) -> Result<Vec<Conversation>>;

    /// Title shown in the header of the open conversation pane.
    async fn open_conversation_title(&self) -> Result<Option<String>>;

    /// Scroll the conversation list one page; `false` when it did not move.
    async fn scroll_conversation_list(&self) -> Result<bool>;

    async fn message_count(&self) -> Result<usize>;

    /// `None` when the scroll container is not rendered.
    async fn scroll_metrics(&self) -> Result<Option<ScrollMetrics>>;

    async fn scroll(&self, command: ScrollCommand) -> Result<()>;

    /// Toggle container height and overflow to force a layout pass.
    async fn force_reflow(&self) -> Result<()>;

    /// Hide/show the container, toggle zoom, and fire resize and mouse events.
    async fn last_resort_nudge(&self) -> Result<()>;

    async fn date_evidence(&self) -> Result<DateEvidence>;

    async fn media_candidates(&self, kind: MediaKind) -> Result<Vec<MediaCandidate>>;

    /// Fetch the bytes behind a page-local URL (`blob:` or `data:`).
    async fn fetch_blob(&self, url: &str) -> Result<Vec<u8>>;

    async fn snapshot_transcript(&self) -> Result<TranscriptSnapshot>;
}
