//! Locating and opening conversations in the host conversation list.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::app::{BackscrollError, Result};
use crate::browser::{ChatSurface, SelectorTable};
use crate::dom::wait_for_element;
use crate::domain::{Conversation, ElementHandle};
use crate::interaction::Interactor;

const TITLE_POLL: Duration = Duration::from_millis(250);

/// Opens conversations by title.
///
/// Conversation handles go stale whenever the list re-renders, so every
/// operation resolves the entry again instead of caching it.
pub struct Navigator<'a> {
    surface: &'a dyn ChatSurface,
    interactor: &'a Interactor,
    selectors: &'a SelectorTable,
    pane_timeout: Duration,
    max_list_scrolls: u32,
}

impl<'a> Navigator<'a> {
    pub fn new(
        surface: &'a dyn ChatSurface,
        interactor: &'a Interactor,
        selectors: &'a SelectorTable,
        pane_timeout: Duration,
        max_list_scrolls: u32,
    ) -> Self {
        Self {
            surface,
            interactor,
            selectors,
            pane_timeout,
            max_list_scrolls,
        }
    }

    /// Find the list entry for `title`, scrolling the list when it is not rendered.
    pub async fn resolve(&self, title: &str) -> Result<Conversation> {
        for scroll in 0..=self.max_list_scrolls {
            let conversations = self.surface.list_conversations().await?;
            if let Some(found) = conversations.into_iter().find(|c| c.matches(title)) {
                debug!("Resolved conversation {} after {} list scrolls", title, scroll);
                return Ok(found);
            }

            if scroll == self.max_list_scrolls || !self.surface.scroll_conversation_list().await? {
                break;
            }
        }

        Err(BackscrollError::ConversationNotFound(title.to_string()))
    }

    /// Click the conversation and wait until its pane is showing it.
    ///
    /// The message pane of the previous conversation stays mounted, so the
    /// pane header has to carry `title` as well. A click that does not get
    /// there gets one re-click before the timeout is propagated.
    pub async fn open(&self, title: &str) -> Result<ElementHandle> {
        self.surface.ensure_focus().await?;

        let conversation = self.resolve(title).await?;
        self.interactor
            .click(self.surface, &conversation.handle)
            .await?;

        match self.wait_until_open(title).await {
            Ok(pane) => Ok(pane),
            Err(e) if e.is_timeout() => {
                warn!("{} did not open, clicking again", title);
                let conversation = self.resolve(title).await?;
                self.interactor
                    .click(self.surface, &conversation.handle)
                    .await?;
                self.wait_until_open(title).await
            }
            Err(e) => Err(e),
        }
    }

    async fn wait_until_open(&self, title: &str) -> Result<ElementHandle> {
        let deadline = Instant::now() + self.pane_timeout;
        let pane = wait_for_element(self.surface, &self.selectors.message_pane, self.pane_timeout)
            .await?;

        loop {
            let shown = self.surface.open_conversation_title().await?;
            if shown.as_deref().is_some_and(|t| t.trim() == title.trim()) {
                return Ok(pane);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!("Pane header shows {:?} instead of {}", shown, title);
                return Err(BackscrollError::timeout(
                    &self.selectors.header_title,
                    self.pane_timeout,
                ));
            }
            self.surface
                .await_mutation(remaining.min(TITLE_POLL))
                .await?;
        }
    }

    /// Open some other conversation, then come back to `title`.
    ///
    /// Returns `false` when there is no other conversation to bounce through.
    pub async fn reopen(&self, title: &str) -> Result<bool> {
        let conversations = self.surface.list_conversations().await?;
        let Some(other) = conversations.into_iter().find(|c| !c.matches(title)) else {
            return Ok(false);
        };

        info!("Reopening {} via {}", title, other.title);
        self.interactor.click(self.surface, &other.handle).await?;
        tokio::time::sleep(Duration::from_millis(500)).await;
        self.open(title).await?;
        Ok(true)
    }
}
