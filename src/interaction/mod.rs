//! Synthetic pointer input.
//!
//! The host UI ignores bare `element.click()` calls on several controls, so
//! clicks are replayed as a hover/press/release sequence through CDP with a
//! little positional jitter and human-scale pauses between events.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::Result;
use crate::browser::{ChatSurface, PointerEvent, PointerEventKind, Rect};
use crate::domain::ElementHandle;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Maximum random offset from the click target in pixels (default: 3)
    pub jitter_px: f64,
    /// Shortest pause between pointer events in milliseconds (default: 20)
    pub min_delay_ms: u64,
    /// Longest pause between pointer events in milliseconds (default: 80)
    pub max_delay_ms: u64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            jitter_px: 3.0,
            min_delay_ms: 20,
            max_delay_ms: 80,
        }
    }
}

/// A pointer event and the pause to observe after dispatching it.
pub type PlannedEvent = (PointerEvent, Duration);

#[derive(Debug, Clone, Default)]
pub struct Interactor {
    config: InteractionConfig,
}

impl Interactor {
    pub fn new(config: InteractionConfig) -> Self {
        Self { config }
    }

    /// Plan a hover, press, release sequence around `(x, y)`.
    pub fn plan_click<R: Rng>(
        &self,
        rng: &mut R,
        x: f64,
        y: f64,
        max_jitter: f64,
    ) -> Vec<PlannedEvent> {
        let jitter = max_jitter.max(0.0);
        let offset = |rng: &mut R| {
            if jitter > 0.0 {
                rng.random_range(-jitter..=jitter)
            } else {
                0.0
            }
        };

        let target_x = x + offset(rng);
        let target_y = y + offset(rng);
        let approach_x = target_x + offset(rng) * 4.0;
        let approach_y = target_y + offset(rng) * 4.0;

        let (min, max) = (
            self.config.min_delay_ms.min(self.config.max_delay_ms),
            self.config.max_delay_ms.max(self.config.min_delay_ms),
        );
        let pause = |rng: &mut R| Duration::from_millis(rng.random_range(min..=max));

        vec![
            (
                PointerEvent {
                    kind: PointerEventKind::Moved,
                    x: approach_x,
                    y: approach_y,
                },
                pause(rng),
            ),
            (
                PointerEvent {
                    kind: PointerEventKind::Moved,
                    x: target_x,
                    y: target_y,
                },
                pause(rng),
            ),
            (
                PointerEvent {
                    kind: PointerEventKind::Pressed,
                    x: target_x,
                    y: target_y,
                },
                pause(rng),
            ),
            (
                PointerEvent {
                    kind: PointerEventKind::Released,
                    x: target_x,
                    y: target_y,
                },
                pause(rng),
            ),
        ]
    }

    /// Click the center of `element`. A detached element is skipped.
    pub async fn click(&self, surface: &dyn ChatSurface, element: &ElementHandle) -> Result<()> {
        let Some(rect) = surface.bounding_box(element).await? else {
            debug!("Skipping click on detached element {}", element);
            return Ok(());
        };

        let (x, y) = rect.center();
        let max_jitter = self.max_jitter_for(&rect);
        self.dispatch(surface, x, y, max_jitter).await
    }

    /// Click an arbitrary viewport point.
    pub async fn click_at(&self, surface: &dyn ChatSurface, x: f64, y: f64) -> Result<()> {
        self.dispatch(surface, x, y, self.config.jitter_px).await
    }

    /// Keep the jittered point inside small targets.
    fn max_jitter_for(&self, rect: &Rect) -> f64 {
        self.config
            .jitter_px
            .min(rect.width / 4.0)
            .min(rect.height / 4.0)
    }

    async fn dispatch(&self, surface: &dyn ChatSurface, x: f64, y: f64, max_jitter: f64) -> Result<()> {
        let plan = {
            let mut rng = rand::rng();
            self.plan_click(&mut rng, x, y, max_jitter)
        };

        for (event, pause) in plan {
            surface.dispatch_pointer(event).await?;
            tokio::time::sleep(pause).await;
        }

        Ok(())
    }
}
