//! Exponential backoff implementations

use std::{iter::Iterator, time::Duration};

/// Exponential backoff iterator
///
/// Returns monotonically increasing delays until `limit` iterations have been handed out.
/// Each element is the previous one multiplied by `multiplier`.
#[derive(Debug, Clone)]
pub struct Backoff {
    retries: u32,
    limit: u32,
    multiplier: u32,
    current: Duration,
}

impl Backoff {
    /// Creates a new backoff whose first delay is `initial * multiplier`
    pub fn new(initial: Duration, multiplier: u32, limit: u32) -> Self {
        Self {
            retries: 0,
            limit,
            multiplier,
            current: initial,
        }
    }

    /// Number of delays handed out so far
    pub fn retries(&self) -> u32 {
        self.retries.min(self.limit)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::new(Duration::from_millis(25), 2, 13)
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        self.retries = self.retries.saturating_add(1);

        if self.retries > self.limit {
            None
        } else {
            self.current *= self.multiplier;
            Some(self.current)
        }
    }
}
