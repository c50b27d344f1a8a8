//! Bounded wait policies with exponential backoff.

use std::time::Duration;

/// Exponential backoff between polls, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub factor: u32,
}

impl Backoff {
    /// Infinite sequence of delays: `initial`, `initial * factor`, ... capped at `max`.
    #[must_use]
    pub fn delays(&self) -> Delays {
        Delays {
            next: self.initial.min(self.max),
            max: self.max,
            factor: self.factor.max(1),
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(2),
            max: Duration::from_secs(15),
            factor: 2,
        }
    }
}

/// Iterator returned by [`Backoff::delays`].
#[derive(Debug, Clone)]
pub struct Delays {
    next: Duration,
    max: Duration,
    factor: u32,
}

impl Iterator for Delays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        self.next = current.saturating_mul(self.factor).min(self.max);
        Some(current)
    }
}

/// A wait that gives up after `timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub backoff: Backoff,
}

impl WaitPolicy {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            backoff: Backoff::default(),
        }
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }
}
