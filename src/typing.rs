//! Typing indicator with debounced decay.
//!
//! A `typing` event shows the indicator and arms a countdown; another event
//! before it fires restarts the countdown instead of stacking a second one.
//! The indicator holds only a deadline. Whoever drives the session sleeps
//! until [`TypingIndicator::deadline`] and then calls
//! [`TypingIndicator::expire`], so the clear runs on the same loop as every
//! other state change.

#[cfg(test)]
#[path = "typing_test.rs"]
mod typing_test;

use std::time::Duration;

use tokio::time::Instant;

pub const DEFAULT_TYPING_DECAY: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
pub struct TypingIndicator {
    decay: Duration,
    deadline: Option<Instant>,
}

impl Default for TypingIndicator {
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_DECAY)
    }
}

impl TypingIndicator {
    #[must_use]
    pub fn new(decay: Duration) -> Self {
        Self { decay, deadline: None }
    }

    /// Show the indicator and restart the countdown from `now`.
    pub fn on_typing(&mut self, now: Instant) {
        self.deadline = Some(now + self.decay);
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the pending clear is due, if the indicator is showing.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Clear the indicator if its deadline has passed.
    ///
    /// Returns `true` only for the call that actually cleared it.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Sleep until `deadline`, or forever when there is none.
pub async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
