use std::fmt;

use chrono::NaiveDate;

/// Bookkeeping for one conversation's history load.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollSession {
    pub target_date: NaiveDate,
    pub attempts: u32,
    pub unchanged_iterations: u32,
    pub consecutive_failures: u32,
    pub total_failures: u32,
    pub loaded_messages: usize,
    pub top_tier_hits: u32,
    pub recoveries_invoked: u32,
    pub emergency_resets: u32,
    pub last_resorts: u32,
    pub load_older_clicks: u32,
}

impl ScrollSession {
    pub fn new(target_date: NaiveDate, loaded_messages: usize) -> Self {
        Self {
            target_date,
            attempts: 0,
            unchanged_iterations: 0,
            consecutive_failures: 0,
            total_failures: 0,
            loaded_messages,
            top_tier_hits: 0,
            recoveries_invoked: 0,
            emergency_resets: 0,
            last_resorts: 0,
            load_older_clicks: 0,
        }
    }

    pub fn record_progress(&mut self, loaded_messages: usize) {
        self.loaded_messages = loaded_messages;
        self.unchanged_iterations = 0;
        self.consecutive_failures = 0;
        self.top_tier_hits = 0;
    }

    pub fn record_failure(&mut self) {
        self.unchanged_iterations += 1;
        self.consecutive_failures += 1;
        self.total_failures += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The oldest visible message is on or before the target date.
    TargetReached(NaiveDate),
    /// Hard cap on iterations.
    AttemptCeiling,
    /// No new messages for too many consecutive iterations.
    UnchangedCeiling,
}

impl StopReason {
    pub fn reached_target(&self) -> bool {
        matches!(self, StopReason::TargetReached(_))
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::TargetReached(date) => write!(f, "target reached ({})", date),
            StopReason::AttemptCeiling => f.write_str("attempt ceiling"),
            StopReason::UnchangedCeiling => f.write_str("no new messages"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrollOutcome {
    pub reason: StopReason,
    pub session: ScrollSession,
}
