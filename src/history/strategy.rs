use crate::app::Result;
use crate::browser::{ChatSurface, ScrollCommand};

/// Ways of nudging the viewport toward older messages.
///
/// The host UI silently ignores some techniques some of the time, so the
/// engine rotates through all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollStrategy {
    SmoothIntoView,
    ScrollTopReset,
    InstantIntoView,
    Hybrid,
}

impl ScrollStrategy {
    pub const ROTATION: [ScrollStrategy; 4] = [
        ScrollStrategy::SmoothIntoView,
        ScrollStrategy::ScrollTopReset,
        ScrollStrategy::InstantIntoView,
        ScrollStrategy::Hybrid,
    ];

    pub fn for_attempt(attempt: u32) -> Self {
        Self::ROTATION[attempt as usize % Self::ROTATION.len()]
    }

    pub fn commands(&self) -> Vec<ScrollCommand> {
        match self {
            ScrollStrategy::SmoothIntoView => {
                vec![ScrollCommand::FirstMessageIntoView { smooth: true }]
            }
            ScrollStrategy::ScrollTopReset => vec![ScrollCommand::SetScrollTop(0.0)],
            ScrollStrategy::InstantIntoView => {
                vec![ScrollCommand::FirstMessageIntoView { smooth: false }]
            }
            ScrollStrategy::Hybrid => vec![
                ScrollCommand::ScrollBy(-400.0),
                ScrollCommand::FirstMessageIntoView { smooth: false },
                ScrollCommand::SetScrollTop(0.0),
            ],
        }
    }

    pub async fn apply(&self, surface: &dyn ChatSurface) -> Result<()> {
        for command in self.commands() {
            surface.scroll(command).await?;
        }
        Ok(())
    }
}

/// Escalating techniques for a stalled list, chosen by consecutive failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryTier {
    /// Jump to a small offset from the top and back.
    AlternateOffset,
    /// Click inside the container just below its top edge.
    ClickNearTop,
    /// Toggle container height and overflow to force a layout pass.
    Reflow,
}

impl RecoveryTier {
    pub fn for_failures(consecutive: u32) -> Self {
        match consecutive {
            0 | 1 => RecoveryTier::AlternateOffset,
            2 => RecoveryTier::ClickNearTop,
            _ => RecoveryTier::Reflow,
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            RecoveryTier::AlternateOffset => 1,
            RecoveryTier::ClickNearTop => 2,
            RecoveryTier::Reflow => 3,
        }
    }

    pub fn is_top(&self) -> bool {
        *self == RecoveryTier::Reflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakeSurface;

    #[test]
    fn test_rotation_cycles_through_all_strategies() {
        let picked: Vec<_> = (0..8).map(ScrollStrategy::for_attempt).collect();
        assert_eq!(&picked[..4], &ScrollStrategy::ROTATION);
        assert_eq!(&picked[4..], &ScrollStrategy::ROTATION);
    }

    #[test]
    fn test_each_strategy_issues_commands() {
        for strategy in ScrollStrategy::ROTATION {
            assert!(!strategy.commands().is_empty());
        }
        assert_eq!(
            ScrollStrategy::ScrollTopReset.commands(),
            vec![ScrollCommand::SetScrollTop(0.0)]
        );
        assert_eq!(
            ScrollStrategy::SmoothIntoView.commands(),
            vec![ScrollCommand::FirstMessageIntoView { smooth: true }]
        );
    }

    #[tokio::test]
    async fn test_apply_forwards_commands_in_order() {
        let surface = FakeSurface::new();
        ScrollStrategy::Hybrid.apply(&surface).await.unwrap();
        assert_eq!(surface.scroll_log(), ScrollStrategy::Hybrid.commands());
    }

    #[test]
    fn test_tier_escalation() {
        assert_eq!(RecoveryTier::for_failures(1), RecoveryTier::AlternateOffset);
        assert_eq!(RecoveryTier::for_failures(2), RecoveryTier::ClickNearTop);
        assert_eq!(RecoveryTier::for_failures(3), RecoveryTier::Reflow);
        assert_eq!(RecoveryTier::for_failures(9), RecoveryTier::Reflow);
        assert!(RecoveryTier::Reflow.is_top());
        assert_eq!(RecoveryTier::ClickNearTop.level(), 2);
    }
}
