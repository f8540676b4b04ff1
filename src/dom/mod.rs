//! Waiting for host UI elements to become visible.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::app::{BackscrollError, Result};
use crate::browser::ChatSurface;
use crate::domain::ElementHandle;

/// Longest single mutation wait; visibility can change through scrolling
/// without any DOM mutation, so the query is repeated at least this often.
const MAX_OBSERVE_SLICE: Duration = Duration::from_millis(250);

/// Allowance for a CDP round trip already in flight when the deadline hits.
const DEADLINE_GRACE: Duration = Duration::from_millis(100);

/// Wait until an element matching `selector` is visible.
///
/// Resolves immediately when the element is already rendered, otherwise
/// suspends on mutation waits and re-queries after each one. Fails with
/// [`BackscrollError::Timeout`] once `timeout` has elapsed.
pub async fn wait_for_element(
    surface: &dyn ChatSurface,
    selector: &str,
    timeout: Duration,
) -> Result<ElementHandle> {
    let deadline = Instant::now() + timeout;

    let wait = async {
        loop {
            if let Some(handle) = surface.find_visible(selector).await? {
                return Ok(handle);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BackscrollError::timeout(selector, timeout));
            }

            let mutated = surface
                .await_mutation(remaining.min(MAX_OBSERVE_SLICE))
                .await?;
            if mutated {
                debug!("DOM mutated while waiting for {}", selector);
            }
        }
    };

    match tokio::time::timeout(timeout + DEADLINE_GRACE, wait).await {
        Ok(result) => result,
        Err(_) => Err(BackscrollError::timeout(selector, timeout)),
    }
}
