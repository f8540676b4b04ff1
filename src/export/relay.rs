use serde::Serialize;
use tokio::sync::mpsc;

use crate::app::{BackscrollError, Result};

/// Per-conversation counters reported with progress events.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStats {
    pub messages: usize,
    pub scroll_attempts: u32,
    pub reached_target: bool,
    pub media_items: usize,
    pub month_segments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProgressEvent {
    #[serde(rename_all = "camelCase")]
    Progress {
        conversation: String,
        percent_complete: u8,
        stats: ConversationStats,
    },
    #[serde(rename_all = "camelCase")]
    AutomationError {
        conversation: String,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    ExportComplete { processed: usize, failed: usize },
}

/// Sending half of the progress channel.
#[derive(Debug, Clone)]
pub struct ProgressRelay {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressRelay {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Fails with [`BackscrollError::RelayClosed`] once the consumer is gone.
    pub fn emit(&self, event: ProgressEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| BackscrollError::RelayClosed)
    }

    pub fn progress(
        &self,
        conversation: &str,
        percent_complete: u8,
        stats: ConversationStats,
    ) -> Result<()> {
        self.emit(ProgressEvent::Progress {
            conversation: conversation.to_string(),
            percent_complete: percent_complete.min(100),
            stats,
        })
    }
}
