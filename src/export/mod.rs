//! Export orchestration.
//!
//! Conversations are processed strictly one at a time: the engine drives a
//! single live viewport, so there is nothing to parallelize. Each
//! conversation gets a fresh [`ExportSession`]; a failure is reported on the
//! relay and the batch moves on.
//!
//! ```text
//! open → HistoryEngine → MediaCollector (per kind) → assemble → split_by_month → sink
//! ```

mod relay;
mod sink;

pub use relay::{ConversationStats, ProgressEvent, ProgressRelay};
#[cfg(test)]
pub(crate) use sink::MemorySink;
pub use sink::{DownloadSink, FsSink};

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::app::Result;
use crate::browser::ChatSurface;
use crate::config::Config;
use crate::domain::Conversation;
use crate::history::HistoryEngine;
use crate::interaction::Interactor;
use crate::media::{Fetcher, MediaCollector};
use crate::navigation::Navigator;
use crate::transcript;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Where exports are written (default: `<downloads>/backscroll`)
    pub output_dir: Option<PathBuf>,
    /// How long to wait for a conversation's message pane (default: 20)
    pub pane_timeout_secs: u64,
    /// Pause after the pane appears, before scrolling starts (default: 1000)
    pub select_settle_ms: u64,
    /// Conversation list pages searched for a title (default: 15)
    pub conversation_list_scrolls: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            pane_timeout_secs: 20,
            select_settle_ms: 1000,
            conversation_list_scrolls: 15,
        }
    }
}

impl ExportConfig {
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .or_else(|| dirs::download_dir().map(|d| d.join("backscroll")))
            .unwrap_or_else(|| PathBuf::from("backscroll-export"))
    }

    pub fn pane_timeout(&self) -> Duration {
        Duration::from_secs(self.pane_timeout_secs)
    }
}

/// State for exporting one conversation. Never reused across conversations.
#[derive(Debug)]
pub struct ExportSession {
    pub title: String,
    /// Output directory name, relative to the sink root.
    pub dir_name: String,
    pub stats: ConversationStats,
}

impl ExportSession {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            dir_name: Conversation::sanitized_title(title),
            stats: ConversationStats::default(),
        }
    }

    pub fn file_name(&self, name: &str) -> String {
        format!("{}/{}", self.dir_name, name)
    }
}

#[derive(Debug, Default)]
pub struct ExportSummary {
    pub processed: usize,
    pub exported: Vec<(String, ConversationStats)>,
    pub failed: Vec<(String, String)>,
}

pub struct Exporter<'a> {
    surface: &'a dyn ChatSurface,
    fetcher: &'a dyn Fetcher,
    sink: &'a dyn DownloadSink,
    relay: ProgressRelay,
    config: &'a Config,
    interactor: Interactor,
}

impl<'a> Exporter<'a> {
    pub fn new(
        surface: &'a dyn ChatSurface,
        fetcher: &'a dyn Fetcher,
        sink: &'a dyn DownloadSink,
        relay: ProgressRelay,
        config: &'a Config,
    ) -> Self {
        Self {
            surface,
            fetcher,
            sink,
            relay,
            config,
            interactor: Interactor::new(config.interaction.clone()),
        }
    }

    /// Export each conversation back to `target_date`.
    ///
    /// Per-conversation failures are reported and skipped; only a closed
    /// relay aborts the batch. `ExportComplete` is emitted once at the end.
    pub async fn export_conversations(
        &self,
        titles: &[String],
        target_date: NaiveDate,
    ) -> Result<ExportSummary> {
        let mut summary = ExportSummary::default();
        info!(
            "Exporting {} conversations back to {}",
            titles.len(),
            target_date
        );

        for title in titles {
            let mut session = ExportSession::new(title);

            match self.export_one(&mut session, target_date).await {
                Ok(()) => {
                    info!("Exported {}", title);
                    summary.exported.push((title.clone(), session.stats));
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!("Export of {} failed: {}", title, e);
                    self.relay.emit(ProgressEvent::AutomationError {
                        conversation: title.clone(),
                        message: e.to_string(),
                    })?;
                    summary.failed.push((title.clone(), e.to_string()));
                }
            }
            summary.processed += 1;
        }

        self.relay.emit(ProgressEvent::ExportComplete {
            processed: summary.processed,
            failed: summary.failed.len(),
        })?;

        info!(
            "Export complete: {} processed, {} failed",
            summary.processed,
            summary.failed.len()
        );
        Ok(summary)
    }

    fn report(&self, session: &ExportSession, percent: u8) -> Result<()> {
        self.relay
            .progress(&session.title, percent, session.stats.clone())
    }

    async fn export_one(&self, session: &mut ExportSession, target_date: NaiveDate) -> Result<()> {
        let config = self.config;
        let navigator = Navigator::new(
            self.surface,
            &self.interactor,
            &config.selectors,
            config.export.pane_timeout(),
            config.export.conversation_list_scrolls,
        );

        self.report(session, 0)?;
        navigator.open(&session.title).await?;
        tokio::time::sleep(Duration::from_millis(config.export.select_settle_ms)).await;
        self.report(session, 10)?;

        let engine = HistoryEngine::new(
            self.surface,
            &self.interactor,
            &navigator,
            &config.selectors,
            &config.history,
        );
        let outcome = engine.scroll_to_date(&session.title, target_date).await?;
        session.stats.scroll_attempts = outcome.session.attempts;
        session.stats.reached_target = outcome.reason.reached_target();
        session.stats.messages = outcome.session.loaded_messages;
        self.report(session, 40)?;

        let collector = MediaCollector::new(
            self.surface,
            &self.interactor,
            self.fetcher,
            self.sink,
            &config.media,
            session.dir_name.clone(),
        );
        let kinds = &config.media.kinds;
        for (i, kind) in kinds.iter().enumerate() {
            let items = collector.collect(*kind).await?;
            session.stats.media_items += items.len();
            let percent = 40 + (30 * (i + 1) / kinds.len()) as u8;
            self.report(session, percent)?;
        }

        let extracted = transcript::assemble(self.surface, &session.title, &config.transcript).await?;
        session.stats.messages = extracted.message_count;
        self.sink.save(
            transcript::render_document(&extracted).into_bytes(),
            &session.file_name("transcript.html"),
        );
        self.report(session, 85)?;

        let segments = transcript::split_by_month(&extracted, &config.transcript)?;
        for segment in &segments {
            self.sink.save(
                transcript::render_segment(&extracted, segment).into_bytes(),
                &session.file_name(&format!("{}.html", segment.month)),
            );
        }
        session.stats.month_segments = segments.len();
        self.report(session, 100)?;

        Ok(())
    }
}
