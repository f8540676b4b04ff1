//! Scripted in-memory page used by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::time::Instant;

use super::{
    ChatSurface, DateEvidence, MediaCandidate, PointerEvent, PointerEventKind, Rect,
    ScrollCommand, ScrollMetrics, SelectorTable, TranscriptSnapshot,
};
use crate::app::{BackscrollError, Result};
use crate::domain::{Conversation, ElementHandle, MediaKind};

const ROW_HEIGHT: f64 = 100.0;
const CLIENT_HEIGHT: f64 = 800.0;
const SCROLL_CONTAINER: &str = "scroll-container";
const LOAD_OLDER: &str = "load-older";
const PANE: &str = "pane";

struct FakeConversation {
    title: String,
    handle: ElementHandle,
    revealed_after: u32,
}

#[derive(Default)]
struct State {
    visible: HashMap<String, ElementHandle>,
    delayed: Vec<(String, ElementHandle, Instant)>,
    rects: HashMap<String, Rect>,
    pointer_events: Vec<PointerEvent>,
    clicked: Vec<String>,

    conversations: Vec<FakeConversation>,
    list_scrolls: u32,
    active: Option<String>,
    home: Option<String>,
    pane_visible: bool,
    pane_failures: u32,
    ignored_clicks: u32,
    opened: Vec<String>,
    focus_count: u32,

    history: Vec<NaiveDate>,
    rendered: usize,
    load_step: usize,
    frozen: bool,
    unfreeze_on_reopen: bool,
    load_older: bool,
    scroll_top: f64,
    content_height: f64,
    scroll_log: Vec<ScrollCommand>,
    reflows: u32,
    nudges: u32,
    date_evidence_fails: bool,

    media_pages: HashMap<MediaKind, Vec<Vec<MediaCandidate>>>,
    media_queries: u32,
    blobs: HashMap<String, Vec<u8>>,
    snapshot: Option<TranscriptSnapshot>,
}

impl State {
    fn scroll_height(&self) -> f64 {
        (self.rendered as f64 * ROW_HEIGHT).max(self.content_height)
    }

    fn max_top(&self) -> f64 {
        (self.scroll_height() - CLIENT_HEIGHT).max(0.0)
    }

    fn set_top(&mut self, top: f64) {
        self.scroll_top = top.clamp(0.0, self.max_top());
    }

    fn load_more(&mut self) {
        self.rendered = (self.rendered + self.load_step).min(self.history.len());
    }

    fn open_conversation(&mut self, title: String) {
        let previous = self.active.replace(title.clone());
        if self.pane_failures > 0 {
            self.pane_failures -= 1;
            self.pane_visible = false;
        } else {
            self.pane_visible = true;
        }

        let returning_home = self.home.as_deref() == Some(title.as_str())
            && previous.is_some_and(|p| p != title);
        if self.unfreeze_on_reopen && returning_home {
            self.frozen = false;
        }
        self.opened.push(title);
    }

    fn activate(&mut self, handle: String) {
        if let Some(conversation) = self
            .conversations
            .iter()
            .find(|c| c.handle.as_str() == handle)
        {
            let title = conversation.title.clone();
            if self.ignored_clicks > 0 {
                self.ignored_clicks -= 1;
                return;
            }
            self.open_conversation(title);
        } else if handle == LOAD_OLDER {
            self.load_more();
        }
        self.clicked.push(handle);
    }

    fn hit(&self, x: f64, y: f64) -> Option<String> {
        self.rects
            .iter()
            .find(|(_, r)| x >= r.x && x <= r.x + r.width && y >= r.y && y <= r.y + r.height)
            .map(|(handle, _)| handle.clone())
    }
}

pub struct FakeSurface {
    selectors: SelectorTable,
    state: Mutex<State>,
}

impl FakeSurface {
    pub fn new() -> Self {
        Self {
            selectors: SelectorTable::default(),
            state: Mutex::new(State::default()),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn show(&self, selector: &str, handle: &str) {
        self.with(|s| {
            s.visible
                .insert(selector.to_string(), ElementHandle::new(handle))
        });
    }

    pub fn show_after(&self, selector: &str, handle: &str, delay: Duration) {
        let at = Instant::now() + delay;
        self.with(|s| {
            s.delayed
                .push((selector.to_string(), ElementHandle::new(handle), at))
        });
    }

    pub fn place(&self, handle: &ElementHandle, rect: Rect) {
        self.with(|s| s.rects.insert(handle.as_str().to_string(), rect));
    }

    pub fn pointer_events(&self) -> Vec<PointerEvent> {
        self.with(|s| s.pointer_events.clone())
    }

    /// Handles that received a completed click, in order.
    pub fn clicked(&self) -> Vec<String> {
        self.with(|s| s.clicked.clone())
    }

    pub fn add_conversation(&self, title: &str) {
        self.add_hidden_conversation(title, 0);
    }

    /// A conversation listed only after `revealed_after` list scrolls.
    pub fn add_hidden_conversation(&self, title: &str, revealed_after: u32) {
        self.with(|s| {
            let index = s.conversations.len();
            let handle = ElementHandle::new(format!("conv-{}", index));
            s.rects.insert(
                handle.as_str().to_string(),
                Rect::new(0.0, index as f64 * 60.0, 280.0, 56.0),
            );
            s.conversations.push(FakeConversation {
                title: title.to_string(),
                handle,
                revealed_after,
            });
        });
    }

    pub fn list_scrolls(&self) -> u32 {
        self.with(|s| s.list_scrolls)
    }

    /// The next `count` conversation clicks leave the message pane hidden.
    pub fn fail_pane_opens(&self, count: u32) {
        self.with(|s| s.pane_failures = count);
    }

    /// The next `count` conversation clicks leave the current pane as it is.
    pub fn ignore_conversation_clicks(&self, count: u32) {
        self.with(|s| s.ignored_clicks = count);
    }

    pub fn opened(&self) -> Vec<String> {
        self.with(|s| s.opened.clone())
    }

    pub fn focus_count(&self) -> u32 {
        self.with(|s| s.focus_count)
    }

    /// Mark `title` as already open without recording a click.
    pub fn set_active(&self, title: &str) {
        self.with(|s| {
            s.active = Some(title.to_string());
            s.home = Some(title.to_string());
            s.pane_visible = true;
        });
    }

    pub fn fail_date_evidence(&self) {
        self.with(|s| s.date_evidence_fails = true);
    }

    /// Message dates oldest first; the newest `rendered` are on screen and
    /// each load renders `load_step` more.
    pub fn set_history(&self, dates: Vec<NaiveDate>, rendered: usize, load_step: usize) {
        let container = self.selectors.scroll_container.clone();
        self.with(|s| {
            s.rendered = rendered.min(dates.len());
            s.history = dates;
            s.load_step = load_step;
            s.visible
                .insert(container, ElementHandle::new(SCROLL_CONTAINER));
            s.rects.insert(
                SCROLL_CONTAINER.to_string(),
                Rect::new(300.0, 0.0, 700.0, CLIENT_HEIGHT),
            );
            let top = s.max_top();
            s.scroll_top = top;
        });
    }

    pub fn freeze(&self) {
        self.with(|s| s.frozen = true);
    }

    /// Leaving and re-entering the active conversation unfreezes history.
    pub fn unfreeze_on_reopen(&self) {
        self.with(|s| s.unfreeze_on_reopen = true);
    }

    pub fn show_load_older(&self) {
        self.with(|s| {
            s.load_older = true;
            s.rects.insert(
                LOAD_OLDER.to_string(),
                Rect::new(1100.0, 20.0, 80.0, 24.0),
            );
        });
    }

    pub fn scroll_log(&self) -> Vec<ScrollCommand> {
        self.with(|s| s.scroll_log.clone())
    }

    pub fn reflow_count(&self) -> u32 {
        self.with(|s| s.reflows)
    }

    pub fn nudge_count(&self) -> u32 {
        self.with(|s| s.nudges)
    }

    pub fn set_scroll_height(&self, height: f64) {
        self.with(|s| s.content_height = height);
    }

    /// Candidates rendered `pages_up` viewports above the bottom.
    pub fn add_media_page(&self, kind: MediaKind, candidates: Vec<MediaCandidate>) {
        self.with(|s| s.media_pages.entry(kind).or_default().push(candidates));
    }

    pub fn media_queries(&self) -> u32 {
        self.with(|s| s.media_queries)
    }

    pub fn add_blob(&self, url: &str, bytes: &[u8]) {
        self.with(|s| s.blobs.insert(url.to_string(), bytes.to_vec()));
    }

    pub fn set_snapshot(&self, snapshot: TranscriptSnapshot) {
        self.with(|s| s.snapshot = Some(snapshot));
    }
}

#[async_trait]
impl ChatSurface for FakeSurface {
    async fn find_visible(&self, selector: &str) -> Result<Option<ElementHandle>> {
        let now = Instant::now();
        Ok(self.with(|s| {
            if selector == self.selectors.message_pane {
                return s.pane_visible.then(|| ElementHandle::new(PANE));
            }
            if selector == self.selectors.load_older {
                return s.load_older.then(|| ElementHandle::new(LOAD_OLDER));
            }
            if let Some(handle) = s.visible.get(selector) {
                return Some(handle.clone());
            }
            s.delayed
                .iter()
                .find(|(sel, _, at)| sel == selector && now >= *at)
                .map(|(_, handle, _)| handle.clone())
        }))
    }

    async fn await_mutation(&self, timeout: Duration) -> Result<bool> {
        tokio::time::sleep(timeout).await;
        Ok(false)
    }

    async fn bounding_box(&self, element: &ElementHandle) -> Result<Option<Rect>> {
        Ok(self.with(|s| s.rects.get(element.as_str()).copied()))
    }

    async fn dispatch_pointer(&self, event: PointerEvent) -> Result<()> {
        self.with(|s| {
            s.pointer_events.push(event);
            if event.kind == PointerEventKind::Released {
                if let Some(handle) = s.hit(event.x, event.y) {
                    s.activate(handle);
                }
            }
        });
        Ok(())
    }

    async fn ensure_focus(&self) -> Result<()> {
        self.with(|s| s.focus_count += 1);
        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        Ok(self.with(|s| {
            s.conversations
                .iter()
                .filter(|c| c.revealed_after <= s.list_scrolls)
                .map(|c| Conversation::new(c.title.clone(), c.handle.clone()))
                .collect()
        }))
    }

    async fn open_conversation_title(&self) -> Result<Option<String>> {
        Ok(self.with(|s| {
            if s.pane_visible {
                s.active.clone()
            } else {
                None
            }
        }))
    }

    async fn scroll_conversation_list(&self) -> Result<bool> {
        Ok(self.with(|s| {
            let more = s
                .conversations
                .iter()
                .any(|c| c.revealed_after > s.list_scrolls);
            if more {
                s.list_scrolls += 1;
            }
            more
        }))
    }

    async fn message_count(&self) -> Result<usize> {
        Ok(self.with(|s| s.rendered))
    }

    async fn scroll_metrics(&self) -> Result<Option<ScrollMetrics>> {
        Ok(self.with(|s| {
            let height = s.scroll_height();
            (height > 0.0).then(|| ScrollMetrics {
                scroll_top: s.scroll_top,
                scroll_height: height,
                client_height: CLIENT_HEIGHT,
            })
        }))
    }

    async fn scroll(&self, command: ScrollCommand) -> Result<()> {
        self.with(|s| {
            s.scroll_log.push(command);
            match command {
                ScrollCommand::FirstMessageIntoView { .. } => {
                    s.set_top(0.0);
                    if !s.frozen {
                        s.load_more();
                    }
                }
                ScrollCommand::SetScrollTop(top) => {
                    s.set_top(top);
                    if top <= 0.0 && !s.frozen {
                        s.load_more();
                    }
                }
                ScrollCommand::ScrollBy(delta) => {
                    let top = s.scroll_top + delta;
                    s.set_top(top);
                }
                ScrollCommand::ToBottom => {
                    let top = s.max_top();
                    s.scroll_top = top;
                }
            }
        });
        Ok(())
    }

    async fn force_reflow(&self) -> Result<()> {
        self.with(|s| s.reflows += 1);
        Ok(())
    }

    async fn last_resort_nudge(&self) -> Result<()> {
        self.with(|s| s.nudges += 1);
        Ok(())
    }

    async fn date_evidence(&self) -> Result<DateEvidence> {
        self.with(|s| {
            if s.date_evidence_fails {
                return Err(BackscrollError::Browser("evaluation failed".into()));
            }
            let start = s.history.len() - s.rendered;
            Ok(DateEvidence {
                timestamp_attributes: s.history[start..]
                    .iter()
                    .map(|d| format!("[10:00, {}] Alice: ", d.format("%d/%m/%Y")))
                    .collect(),
                ..Default::default()
            })
        })
    }

    async fn media_candidates(&self, kind: MediaKind) -> Result<Vec<MediaCandidate>> {
        Ok(self.with(|s| {
            s.media_queries += 1;
            let page = ((s.max_top() - s.scroll_top) / CLIENT_HEIGHT).round() as usize;
            s.media_pages
                .get(&kind)
                .and_then(|pages| pages.get(page))
                .cloned()
                .unwrap_or_default()
        }))
    }

    async fn fetch_blob(&self, url: &str) -> Result<Vec<u8>> {
        self.with(|s| {
            s.blobs
                .get(url)
                .cloned()
                .ok_or_else(|| BackscrollError::Browser(format!("no blob at {}", url)))
        })
    }

    async fn snapshot_transcript(&self) -> Result<TranscriptSnapshot> {
        self.with(|s| {
            s.snapshot
                .clone()
                .ok_or_else(|| BackscrollError::Browser("message container missing".into()))
        })
    }
}
