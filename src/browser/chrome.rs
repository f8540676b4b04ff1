use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::app::{BackscrollError, Result};
use crate::browser::config::{BrowserConfig, SelectorTable};
use crate::browser::scripts::ScriptBuilder;
use crate::browser::{
    ChatSurface, DateEvidence, MediaCandidate, PointerEvent, PointerEventKind, Rect,
    ScrollCommand, ScrollMetrics, TranscriptSnapshot,
};
use crate::domain::{Conversation, ElementHandle, MediaKind};

#[derive(Debug, Deserialize)]
struct RawConversation {
    title: String,
    handle: ElementHandle,
}

/// Chat page driven through chromiumoxide
pub struct ChromeSurface {
    _browser: Browser,
    page: Page,
    scripts: ScriptBuilder,
}

impl ChromeSurface {
    /// Launch (or attach to) Chrome and open the chat client.
    pub async fn open(config: &BrowserConfig, selectors: SelectorTable) -> Result<Self> {
        let (browser, mut handler) = match config.cdp_url {
            Some(ref url) => {
                info!("Connecting to Chrome at {}", url);
                Browser::connect(url.as_str()).await.map_err(|e| {
                    BackscrollError::Browser(format!("Failed to connect to {}: {}", url, e))
                })?
            }
            None => {
                let mut builder = CdpBrowserConfig::builder()
                    .arg("--disable-gpu")
                    .arg("--disable-dev-shm-usage")
                    .arg("--disable-software-rasterizer");

                if !config.headless {
                    builder = builder.with_head();
                }

                if let Some(ref dir) = config.user_data_dir {
                    std::fs::create_dir_all(dir)?;
                    builder = builder.user_data_dir(dir);
                }

                let browser_config = builder.build().map_err(|e| {
                    BackscrollError::Browser(format!("Failed to build browser config: {}", e))
                })?;

                Browser::launch(browser_config).await.map_err(|e| {
                    BackscrollError::Browser(format!(
                        "Failed to launch browser: {}. Is Chrome or Chromium installed and in PATH?",
                        e
                    ))
                })?
            }
        };

        // Spawn the browser handler
        tokio::spawn(async move {
            while let Some(_event) = handler.next().await {
                // Handle browser events
            }
        });

        let page = Self::find_or_open_page(&browser, &config.app_url).await?;

        if let Some(ref ua) = config.user_agent {
            page.set_user_agent(ua)
                .await
                .map_err(|e| BackscrollError::Browser(format!("Failed to set user agent: {}", e)))?;
        }

        Ok(Self {
            _browser: browser,
            page,
            scripts: ScriptBuilder::new(selectors),
        })
    }

    /// Reuse a tab already showing the client, otherwise open a new one.
    async fn find_or_open_page(browser: &Browser, app_url: &str) -> Result<Page> {
        let host = url::Url::parse(app_url)?
            .host_str()
            .map(str::to_string)
            .unwrap_or_default();

        if let Ok(pages) = browser.pages().await {
            for page in pages {
                if let Ok(Some(current)) = page.url().await {
                    if !host.is_empty() && current.contains(&host) {
                        debug!("Reusing open tab at {}", current);
                        return Ok(page);
                    }
                }
            }
        }

        let page = browser
            .new_page(app_url)
            .await
            .map_err(|e| BackscrollError::Browser(format!("Failed to create page: {}", e)))?;

        page.wait_for_navigation()
            .await
            .map_err(|e| BackscrollError::Browser(format!("Navigation failed: {}", e)))?;

        Ok(page)
    }

    pub fn selectors(&self) -> &SelectorTable {
        self.scripts.selectors()
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|e| BackscrollError::Browser(format!("Invalid evaluation: {}", e)))?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| BackscrollError::Browser(format!("Script execution failed: {}", e)))?;

        let value = result.value().cloned().unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl ChatSurface for ChromeSurface {
    async fn find_visible(&self, selector: &str) -> Result<Option<ElementHandle>> {
        self.eval(self.scripts.find_visible(selector)).await
    }

    async fn await_mutation(&self, timeout: Duration) -> Result<bool> {
        self.eval(self.scripts.await_mutation(timeout.as_millis() as u64))
            .await
    }

    async fn bounding_box(&self, element: &ElementHandle) -> Result<Option<Rect>> {
        self.eval(self.scripts.bounding_box(element.as_str())).await
    }

    async fn dispatch_pointer(&self, event: PointerEvent) -> Result<()> {
        let kind = match event.kind {
            PointerEventKind::Moved => DispatchMouseEventType::MouseMoved,
            PointerEventKind::Pressed => DispatchMouseEventType::MousePressed,
            PointerEventKind::Released => DispatchMouseEventType::MouseReleased,
        };

        let mut builder = DispatchMouseEventParams::builder()
            .r#type(kind)
            .x(event.x)
            .y(event.y);

        if event.kind != PointerEventKind::Moved {
            builder = builder.button(MouseButton::Left).click_count(1);
        }

        let params = builder
            .build()
            .map_err(|e| BackscrollError::Browser(format!("Invalid mouse event: {}", e)))?;

        self.page
            .execute(params)
            .await
            .map_err(|e| BackscrollError::Browser(format!("Mouse dispatch failed: {}", e)))?;

        Ok(())
    }

    async fn ensure_focus(&self) -> Result<()> {
        self.page
            .bring_to_front()
            .await
            .map_err(|e| BackscrollError::Browser(format!("Failed to focus page: {}", e)))?;
        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let raw: Vec<RawConversation> = self.eval(self.scripts.list_conversations()).await?;
        Ok(raw
            .into_iter()
            .map(|c| Conversation::new(c.title, c.handle))
            .collect())
    }

    async fn open_conversation_title(&self) -> Result<Option<String>> {
        self.eval(self.scripts.open_conversation_title()).await
    }

    async fn scroll_conversation_list(&self) -> Result<bool> {
        self.eval(self.scripts.scroll_conversation_list()).await
    }

    async fn message_count(&self) -> Result<usize> {
        self.eval(self.scripts.message_count()).await
    }

    async fn scroll_metrics(&self) -> Result<Option<ScrollMetrics>> {
        self.eval(self.scripts.scroll_metrics()).await
    }

    async fn scroll(&self, command: ScrollCommand) -> Result<()> {
        let _: bool = self.eval(self.scripts.scroll(command)).await?;
        Ok(())
    }

    async fn force_reflow(&self) -> Result<()> {
        let _: bool = self.eval(self.scripts.force_reflow()).await?;
        Ok(())
    }

    async fn last_resort_nudge(&self) -> Result<()> {
        let _: bool = self.eval(self.scripts.last_resort_nudge()).await?;
        Ok(())
    }

    async fn date_evidence(&self) -> Result<DateEvidence> {
        self.eval(self.scripts.date_evidence()).await
    }

    async fn media_candidates(&self, kind: MediaKind) -> Result<Vec<MediaCandidate>> {
        self.eval(self.scripts.media_candidates(kind)).await
    }

    async fn fetch_blob(&self, url: &str) -> Result<Vec<u8>> {
        let encoded: String = self.eval(self.scripts.fetch_blob(url)).await?;
        Ok(base64::engine::general_purpose::STANDARD.decode(encoded)?)
    }

    async fn snapshot_transcript(&self) -> Result<TranscriptSnapshot> {
        let snapshot: Option<TranscriptSnapshot> =
            self.eval(self.scripts.snapshot_transcript()).await?;
        snapshot.ok_or_else(|| {
            BackscrollError::Browser(format!(
                "Transcript container not found: {}",
                self.selectors().transcript_container
            ))
        })
    }
}
