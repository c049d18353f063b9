//! Reconnection Policy
//!
//! Bounded dial retries with a fixed delay between attempts. Each call to
//! connect gets a fresh policy; the number of reconnects over the life of a
//! client is not bounded.

use std::time::Duration;

/// Default delay between dial attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Default number of dial attempts per connect.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 25;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay between consecutive dial attempts.
    pub delay: Duration,
    /// Maximum dial attempts per connect (0 is treated as 1).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RETRY_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }

    /// Create configuration from `StreamSettings`.
    #[must_use]
    pub const fn from_stream_settings(settings: &crate::StreamSettings) -> Self {
        Self {
            delay: settings.retry_delay,
            max_attempts: settings.max_retries,
        }
    }

    /// Attempt budget, never below one.
    #[must_use]
    pub const fn effective_attempts(&self) -> u32 {
        if self.max_attempts == 0 {
            1
        } else {
            self.max_attempts
        }
    }
}

/// Counts dial attempts against the configured budget.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tiqs_stream::infrastructure::tiqs::reconnect::{ReconnectConfig, ReconnectPolicy};
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::new(Duration::from_secs(1), 2));
///
/// assert_eq!(policy.next_attempt(), Some(1));
/// assert_eq!(policy.delay_before_next(), Some(Duration::from_secs(1)));
/// assert_eq!(policy.next_attempt(), Some(2));
/// assert_eq!(policy.delay_before_next(), None);
/// assert_eq!(policy.next_attempt(), None);
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempt_count: 0,
        }
    }

    /// Start the next attempt and return its ordinal (1-based).
    ///
    /// Returns `None` once the budget is spent.
    pub const fn next_attempt(&mut self) -> Option<u32> {
        if self.attempt_count >= self.config.effective_attempts() {
            return None;
        }
        self.attempt_count += 1;
        Some(self.attempt_count)
    }

    /// Delay to sleep before the next attempt, or `None` if none remain.
    #[must_use]
    pub const fn delay_before_next(&self) -> Option<Duration> {
        if self.should_retry() {
            Some(self.config.delay)
        } else {
            None
        }
    }

    /// Get the current attempt count.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Total attempts allowed.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.config.effective_attempts()
    }

    /// Check if another attempt is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.attempt_count < self.config.effective_attempts()
    }
}
