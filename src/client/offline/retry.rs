//! # Retry Policy
//!
//! Backoff for follow-up drains and the dead-letter threshold. Delays are a
//! pure function of an action's `attempts` counter, so two processes with
//! the same queue contents schedule the same retry.

use crate::shared::SyncConfig;
use std::time::Duration;

/// Exponential backoff with a cap, plus an optional dead-letter limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    base: Duration,
    max: Duration,
    dead_letter_after: Option<u32>,
}

impl RetryPolicy {
    pub fn new(base: Duration, max: Duration, dead_letter_after: Option<u32>) -> Self {
        Self {
            base,
            max: max.max(base),
            dead_letter_after,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            Duration::from_secs(config.retry_base_secs),
            Duration::from_secs(config.retry_max_secs),
            config.dead_letter_after,
        )
    }

    /// Delay before retrying an action that has failed `attempts` times.
    ///
    /// `base * 2^(attempts - 1)`, capped at `max`; zero before any failure.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        if attempts == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempts - 1);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Whether an action with this many failures should leave the queue
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.dead_letter_after
            .map_or(false, |limit| attempts >= limit)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}
