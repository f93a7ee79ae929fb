//! Reconnect policy.
//!
//! The bingo client retries a lost connection a bounded number of times
//! with a fixed delay between attempts. There is no backoff growth and no
//! jitter: every retry waits exactly [`ReconnectPolicy::retry_delay`].

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default number of consecutive reconnect attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default wait before each reconnect attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(3000);

/// Default limit on a single connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// Policy controlling reconnect attempts after an unexpected close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive reconnect attempts allowed before giving up.
    ///
    /// The initial connection attempt is not counted.
    pub max_retries: u32,
    /// Fixed delay before every reconnect attempt.
    pub retry_delay: Duration,
    /// Upper bound on one connection attempt; expiry counts as a failure.
    pub connect_timeout: Duration,
}

impl ReconnectPolicy {
    /// Creates a policy with the given retry budget and delay.
    #[inline]
    #[must_use]
    pub const fn fixed(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Creates a policy that never reconnects.
    #[inline]
    #[must_use]
    pub const fn disabled() -> Self {
        Self::fixed(0, Duration::ZERO)
    }

    /// Sets the per-attempt connection timeout.
    #[inline]
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Returns `true` if another attempt is allowed after `retry_count`
    /// consecutive retries.
    #[inline]
    #[must_use]
    pub const fn should_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_retries
    }

    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the connect timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect_timeout must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

// ============================================================================
// Tests
// ============================================================================
