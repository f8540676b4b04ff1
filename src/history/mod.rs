//! Loading older history until a target date is on screen.
//!
//! The chat pane is a virtualized list that renders older messages only when
//! it believes the user scrolled up. [`HistoryEngine`] keeps nudging it with a
//! rotating set of scroll strategies, watches the rendered message count, and
//! escalates through increasingly invasive recoveries when the list stalls.
//!
//! ```text
//! Scanning → ScrollStep → StallCheck → Recovering(1..3) | EmergencyReset → Scanning | Stopped
//! ```
//!
//! Every path is bounded: the engine always stops with a [`StopReason`],
//! whether or not the target date was reached.

mod session;
mod strategy;

pub use session::{ScrollOutcome, ScrollSession, StopReason};
pub use strategy::{RecoveryTier, ScrollStrategy};

use std::time::Duration;

use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::app::Result;
use crate::browser::{ChatSurface, ScrollCommand, SelectorTable};
use crate::dates::find_oldest_visible_date;
use crate::interaction::Interactor;
use crate::navigation::Navigator;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Hard cap on scroll iterations per conversation (default: 400)
    pub max_attempts: u32,
    /// Iterations without new messages before giving up (default: 5)
    pub max_unchanged_iterations: u32,
    /// Arrivals at the top recovery tier before an emergency reset (default: 3)
    pub emergency_after_top_tier_hits: u32,
    /// Failure and unchanged counts restored after an emergency reset (default: 1)
    pub failure_reset_floor: u32,
    /// Total failures before the last-resort recovery (default: 15)
    pub total_failure_ceiling: u32,
    /// Wait after each scroll step in milliseconds (default: 1500)
    pub step_delay_ms: u64,
    /// Wait after each recovery in milliseconds (default: 1000)
    pub recovery_delay_ms: u64,
    /// Offset used by the first recovery tier in pixels (default: 150)
    pub alternate_offset_px: f64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 400,
            max_unchanged_iterations: 5,
            emergency_after_top_tier_hits: 3,
            failure_reset_floor: 1,
            total_failure_ceiling: 15,
            step_delay_ms: 1500,
            recovery_delay_ms: 1000,
            alternate_offset_px: 150.0,
        }
    }
}

impl HistoryConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_millis(self.recovery_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EngineState {
    Scanning,
    ScrollStep,
    StallCheck { before: usize },
    Recovering { tier: RecoveryTier, before: usize },
    EmergencyReset { before: usize },
    Stopped(StopReason),
}

pub struct HistoryEngine<'a> {
    surface: &'a dyn ChatSurface,
    interactor: &'a Interactor,
    navigator: &'a Navigator<'a>,
    selectors: &'a SelectorTable,
    config: &'a HistoryConfig,
}

impl<'a> HistoryEngine<'a> {
    pub fn new(
        surface: &'a dyn ChatSurface,
        interactor: &'a Interactor,
        navigator: &'a Navigator<'a>,
        selectors: &'a SelectorTable,
        config: &'a HistoryConfig,
    ) -> Self {
        Self {
            surface,
            interactor,
            navigator,
            selectors,
            config,
        }
    }

    /// Scroll `title`'s open conversation back until `target` is visible.
    pub async fn scroll_to_date(&self, title: &str, target: NaiveDate) -> Result<ScrollOutcome> {
        let mut session = ScrollSession::new(target, self.surface.message_count().await?);
        let mut state = EngineState::Scanning;

        info!(
            "Loading history of {} back to {} ({} messages rendered)",
            title, target, session.loaded_messages
        );

        loop {
            state = match state {
                EngineState::Scanning => self.scan(&session).await,
                EngineState::ScrollStep => self.scroll_step(&mut session).await?,
                EngineState::StallCheck { before } => {
                    self.stall_check(&mut session, before).await?
                }
                EngineState::Recovering { tier, before } => {
                    warn!(
                        "{}: stalled {} times, recovery tier {}",
                        title,
                        session.consecutive_failures,
                        tier.level()
                    );
                    self.recover(tier).await?;
                    session.recoveries_invoked += 1;
                    self.settle(&mut session, before).await?
                }
                EngineState::EmergencyReset { before } => {
                    warn!("{}: recovery tiers exhausted, emergency reset", title);
                    self.emergency_reset(title).await?;
                    session.recoveries_invoked += 1;
                    session.emergency_resets += 1;
                    session.consecutive_failures = self.config.failure_reset_floor;
                    session.unchanged_iterations = self.config.failure_reset_floor;
                    session.top_tier_hits = 0;
                    self.settle(&mut session, before).await?
                }
                EngineState::Stopped(reason) => {
                    match reason {
                        StopReason::TargetReached(_) => info!(
                            "{}: {} after {} attempts, {} messages",
                            title, reason, session.attempts, session.loaded_messages
                        ),
                        _ => warn!(
                            "{}: stopped on {} after {} attempts, {} messages loaded",
                            title, reason, session.attempts, session.loaded_messages
                        ),
                    }
                    return Ok(ScrollOutcome { reason, session });
                }
            };
        }
    }

    async fn scan(&self, session: &ScrollSession) -> EngineState {
        if session.attempts >= self.config.max_attempts {
            return EngineState::Stopped(StopReason::AttemptCeiling);
        }

        match find_oldest_visible_date(self.surface).await {
            Some(oldest) if oldest <= session.target_date => {
                EngineState::Stopped(StopReason::TargetReached(oldest))
            }
            _ => EngineState::ScrollStep,
        }
    }

    async fn scroll_step(&self, session: &mut ScrollSession) -> Result<EngineState> {
        let before = self.surface.message_count().await?;
        session.attempts += 1;

        if let Some(button) = self.surface.find_visible(&self.selectors.load_older).await? {
            debug!("Clicking load-older control");
            self.interactor.click(self.surface, &button).await?;
            tokio::time::sleep(self.config.step_delay()).await;

            let after = self.surface.message_count().await?;
            session.load_older_clicks += 1;
            session.record_progress(after.max(before));
            return Ok(EngineState::Scanning);
        }

        let strategy = ScrollStrategy::for_attempt(session.attempts - 1);
        debug!("Attempt {}: {:?}", session.attempts, strategy);
        strategy.apply(self.surface).await?;
        tokio::time::sleep(self.config.step_delay()).await;

        Ok(EngineState::StallCheck { before })
    }

    async fn stall_check(&self, session: &mut ScrollSession, before: usize) -> Result<EngineState> {
        let after = self.surface.message_count().await?;
        if after > before {
            debug!("Loaded {} -> {} messages", before, after);
            session.record_progress(after);
            return Ok(EngineState::Scanning);
        }

        session.record_failure();

        if session.total_failures > self.config.total_failure_ceiling {
            warn!(
                "{} failed scroll attempts in total, last-resort recovery",
                session.total_failures
            );
            self.surface.last_resort_nudge().await?;
            tokio::time::sleep(self.config.recovery_delay()).await;
            session.last_resorts += 1;
            session.total_failures = 0;

            let after = self.surface.message_count().await?;
            if after > before {
                session.record_progress(after);
                return Ok(EngineState::Scanning);
            }
        }

        let tier = RecoveryTier::for_failures(session.consecutive_failures);
        if tier.is_top() {
            session.top_tier_hits += 1;
            if session.top_tier_hits >= self.config.emergency_after_top_tier_hits {
                // a reset already had its window
                if session.emergency_resets > 0
                    && session.unchanged_iterations >= self.config.max_unchanged_iterations
                {
                    return Ok(EngineState::Stopped(StopReason::UnchangedCeiling));
                }
                return Ok(EngineState::EmergencyReset { before });
            }
        }

        Ok(EngineState::Recovering { tier, before })
    }

    /// Decide whether a recovery helped.
    async fn settle(&self, session: &mut ScrollSession, before: usize) -> Result<EngineState> {
        let after = self.surface.message_count().await?;
        if after > before {
            session.record_progress(after);
            return Ok(EngineState::Scanning);
        }

        if session.unchanged_iterations >= self.config.max_unchanged_iterations {
            return Ok(EngineState::Stopped(StopReason::UnchangedCeiling));
        }

        Ok(EngineState::Scanning)
    }

    async fn recover(&self, tier: RecoveryTier) -> Result<()> {
        match tier {
            RecoveryTier::AlternateOffset => {
                self.surface
                    .scroll(ScrollCommand::SetScrollTop(self.config.alternate_offset_px))
                    .await?;
                tokio::time::sleep(self.config.recovery_delay() / 2).await;
                self.surface.scroll(ScrollCommand::SetScrollTop(0.0)).await?;
            }
            RecoveryTier::ClickNearTop => {
                let container = self
                    .surface
                    .find_visible(&self.selectors.scroll_container)
                    .await?;
                let rect = match container {
                    Some(ref handle) => self.surface.bounding_box(handle).await?,
                    None => None,
                };

                match rect {
                    Some(rect) => {
                        let (x, _) = rect.center();
                        let y = rect.y + (rect.height / 10.0).clamp(10.0, 40.0);
                        self.interactor.click_at(self.surface, x, y).await?;
                    }
                    None => {
                        self.surface
                            .scroll(ScrollCommand::FirstMessageIntoView { smooth: false })
                            .await?;
                    }
                }
                self.surface.scroll(ScrollCommand::SetScrollTop(0.0)).await?;
            }
            RecoveryTier::Reflow => {
                self.surface.force_reflow().await?;
            }
        }

        tokio::time::sleep(self.config.recovery_delay()).await;
        Ok(())
    }

    async fn emergency_reset(&self, title: &str) -> Result<()> {
        match self.navigator.reopen(title).await {
            Ok(true) => {
                self.surface
                    .scroll(ScrollCommand::FirstMessageIntoView { smooth: false })
                    .await?;
                tokio::time::sleep(self.config.recovery_delay()).await;
                return Ok(());
            }
            Ok(false) => debug!("No other conversation to bounce through"),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!("Reopening {} failed: {}", title, e),
        }

        self.randomized_scroll().await
    }

    async fn randomized_scroll(&self) -> Result<()> {
        let Some(metrics) = self.surface.scroll_metrics().await? else {
            return Ok(());
        };

        let positions: Vec<f64> = {
            let mut rng = rand::rng();
            (0..3)
                .map(|_| rng.random_range(0.0..0.3) * metrics.scroll_height)
                .collect()
        };

        for position in positions {
            self.surface
                .scroll(ScrollCommand::SetScrollTop(position))
                .await?;
            tokio::time::sleep(self.config.recovery_delay() / 3).await;
        }

        self.surface.scroll(ScrollCommand::SetScrollTop(0.0)).await?;
        tokio::time::sleep(self.config.recovery_delay()).await;
        Ok(())
    }
}
