//! Sweeping a conversation for images, videos, documents and links.
//!
//! The collector starts at the newest message and moves up one viewport per
//! pass, so everything the history engine loaded is rendered at least once.
//! Identities are deduplicated per call; nothing is shared between calls.

mod fetcher;

pub use fetcher::{is_remote, Fetcher, HttpFetcher};

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::app::Result;
use crate::browser::{ChatSurface, MediaCandidate, ScrollCommand, ScrollMetrics};
use crate::domain::{MediaItem, MediaKind};
use crate::export::DownloadSink;
use crate::interaction::Interactor;

/// Scroll step used when the container reports no geometry.
const FALLBACK_STEP_PX: f64 = 600.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Kinds collected per conversation (default: all)
    pub kinds: Vec<MediaKind>,
    /// Upper bound on sweep passes per kind (default: 40)
    pub max_passes: u32,
    /// Consecutive passes with unchanged scroll offset and height before stopping (default: 3)
    pub idle_pass_limit: u32,
    /// Wait after each pass in milliseconds (default: 900)
    pub pass_delay_ms: u64,
    /// Wait after triggering a document download in milliseconds (default: 600)
    pub download_delay_ms: u64,
    pub links_file_name: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            kinds: MediaKind::ALL.to_vec(),
            max_passes: 40,
            idle_pass_limit: 3,
            pass_delay_ms: 900,
            download_delay_ms: 600,
            links_file_name: "links.txt".to_string(),
        }
    }
}

/// Identity used for deduplication, `None` when the candidate is unusable.
pub fn identity_for(kind: MediaKind, candidate: &MediaCandidate) -> Option<String> {
    match kind {
        MediaKind::Image | MediaKind::Video => candidate
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(String::from),
        MediaKind::Link => {
            let url = Url::parse(candidate.url.as_deref()?.trim()).ok()?;
            matches!(url.scheme(), "http" | "https").then(|| url.to_string())
        }
        MediaKind::Document => {
            let label = candidate.label.as_deref().map(str::trim)?;
            if label.is_empty() {
                return None;
            }
            Some(MediaItem::document_identity(
                label,
                candidate.offset.unwrap_or_default(),
            ))
        }
    }
}

/// File extension from magic bytes.
pub fn sniff_extension(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => Some("png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("jpg"),
        [b'G', b'I', b'F', b'8', ..] => Some("gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("webp"),
        [0x1A, 0x45, 0xDF, 0xA3, ..] => Some("webm"),
        [_, _, _, _, b'f', b't', b'y', b'p', ..] => Some("mp4"),
        _ => None,
    }
}

/// Extension of the last path segment of a remote URL.
fn url_extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    let (_, ext) = segment.rsplit_once('.')?;
    (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}

fn default_extension(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Video => "mp4",
        _ => "jpg",
    }
}

pub struct MediaCollector<'a> {
    surface: &'a dyn ChatSurface,
    interactor: &'a Interactor,
    fetcher: &'a dyn Fetcher,
    sink: &'a dyn DownloadSink,
    config: &'a MediaConfig,
    output_dir: String,
}

impl<'a> MediaCollector<'a> {
    pub fn new(
        surface: &'a dyn ChatSurface,
        interactor: &'a Interactor,
        fetcher: &'a dyn Fetcher,
        sink: &'a dyn DownloadSink,
        config: &'a MediaConfig,
        output_dir: impl Into<String>,
    ) -> Self {
        Self {
            surface,
            interactor,
            fetcher,
            sink,
            config,
            output_dir: output_dir.into(),
        }
    }

    fn pass_delay(&self) -> Duration {
        Duration::from_millis(self.config.pass_delay_ms)
    }

    /// Sweep the conversation for `kind`, persisting each new item once.
    pub async fn collect(&self, kind: MediaKind) -> Result<Vec<MediaItem>> {
        self.surface.scroll(ScrollCommand::ToBottom).await?;
        tokio::time::sleep(self.pass_delay()).await;

        let mut seen = HashSet::new();
        let mut items = Vec::new();
        let mut idle_passes = 0;
        let mut geometry = self.surface.scroll_metrics().await?;

        for pass in 1..=self.config.max_passes {
            for candidate in self.surface.media_candidates(kind).await? {
                let Some(identity) = identity_for(kind, &candidate) else {
                    continue;
                };
                if !seen.insert(identity.clone()) {
                    continue;
                }

                let item = MediaItem::new(kind, identity);
                self.persist(&item, &candidate).await?;
                items.push(item);
            }

            let step = geometry
                .map(|m| m.client_height)
                .filter(|h| *h > 0.0)
                .unwrap_or(FALLBACK_STEP_PX);
            self.surface.scroll(ScrollCommand::ScrollBy(-step)).await?;
            tokio::time::sleep(self.pass_delay()).await;

            let next = self.surface.scroll_metrics().await?;
            if same_geometry(geometry, next) {
                idle_passes += 1;
                if idle_passes >= self.config.idle_pass_limit {
                    debug!("{} sweep idle after {} passes", kind.as_str(), pass);
                    break;
                }
            } else {
                idle_passes = 0;
            }
            geometry = next;
        }

        if kind == MediaKind::Link && !items.is_empty() {
            self.save_links(&items);
        }

        info!("Collected {} {} items", items.len(), kind.as_str());
        Ok(items)
    }

    async fn persist(&self, item: &MediaItem, candidate: &MediaCandidate) -> Result<()> {
        match item.kind {
            MediaKind::Image | MediaKind::Video => {
                let bytes = match self.fetch(&item.identity).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("Could not fetch {}: {}", item.identity, e);
                        return Ok(());
                    }
                };
                let ext = sniff_extension(&bytes)
                    .map(String::from)
                    .or_else(|| url_extension(&item.identity))
                    .unwrap_or_else(|| default_extension(item.kind).to_string());
                let name = format!("{}/media/{}.{}", self.output_dir, item.file_stem(), ext);
                self.sink.save(bytes, &name);
            }
            MediaKind::Document => match &candidate.download_control {
                Some(control) => {
                    debug!("Triggering download of {}", item.identity);
                    self.interactor.click(self.surface, control).await?;
                    tokio::time::sleep(Duration::from_millis(self.config.download_delay_ms)).await;
                }
                None => warn!("No download control for document {}", item.identity),
            },
            MediaKind::Link => {}
        }
        Ok(())
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if is_remote(url) {
            self.fetcher.fetch(url).await
        } else {
            self.surface.fetch_blob(url).await
        }
    }

    fn save_links(&self, items: &[MediaItem]) {
        let mut text = String::new();
        for item in items {
            text.push_str(&item.identity);
            text.push('\n');
        }
        let name = format!("{}/{}", self.output_dir, self.config.links_file_name);
        self.sink.save(text.into_bytes(), &name);
    }
}

/// Idle means neither the offset nor the content height moved.
fn same_geometry(a: Option<ScrollMetrics>, b: Option<ScrollMetrics>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.scroll_top == b.scroll_top && a.scroll_height == b.scroll_height,
        (None, None) => true,
        _ => false,
    }
}
